//! Application settings.
//!
//! Settings come from an optional JSON file; every field has a default, so a
//! partial file (or none at all) is fine. Command-line flags are applied on
//! top by the binary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::platform::OS_RELEASE_PATH;
use crate::shell::ShellCommand;

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "flowbridge.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub shell: ShellSettings,
    /// Directory every command is anchored to. Defaults to the current
    /// directory at startup.
    pub root: Option<PathBuf>,
    /// Flow checkout, relative to `root` unless absolute.
    pub flow_dir: PathBuf,
    pub pdk: Option<String>,
    pub design: Option<String>,
    /// Template used by `:makefile`, relative to `root` unless absolute.
    pub makefile_template: PathBuf,
    /// Remove ANSI escape sequences before classifying and printing output.
    pub strip_ansi: bool,
    /// Platform identity file consulted before any shell command is sent.
    pub os_release: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shell: ShellSettings::default(),
            root: None,
            flow_dir: PathBuf::from("../flow"),
            pdk: None,
            design: None,
            makefile_template: PathBuf::from("defaultMakefile.txt"),
            strip_ansi: true,
            os_release: PathBuf::from(OS_RELEASE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub program: String,
    pub args: Vec<String>,
    /// Environment overrides; `TERM=dumb` is always applied unless set here.
    pub env: BTreeMap<String, String>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        let defaults = ShellCommand::default();
        Self {
            program: defaults.program,
            args: defaults.args,
            env: BTreeMap::new(),
        }
    }
}

impl ShellSettings {
    /// Launch description for the bridge, starting in `cwd`.
    pub fn to_command(&self, cwd: &Path) -> ShellCommand {
        let mut command = ShellCommand::new(self.program.clone()).cwd(cwd);
        for arg in &self.args {
            command = command.arg(arg.clone());
        }
        for (key, value) in &self.env {
            command = command.env(key.clone(), value.clone());
        }
        command
    }
}

impl AppConfig {
    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG_FILE`] if it exists,
    /// else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
