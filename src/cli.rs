//! Command-line flags. Anything given here overrides the settings file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;

/// Command-line arguments for flowbridge.
#[derive(Debug, Parser)]
#[command(name = "flowbridge")]
#[command(about = "Drive an RTL-to-GDSII flow through one persistent shell session")]
#[command(version)]
pub struct Cli {
    /// JSON settings file (defaults to ./flowbridge.json when present)
    #[arg(short, long, value_name = "FILE", env = "FLOWBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory every command is anchored to (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Flow checkout, relative to the root unless absolute
    #[arg(long, value_name = "DIR")]
    pub flow_dir: Option<PathBuf>,

    /// PDK to select at startup
    #[arg(long)]
    pub pdk: Option<String>,

    /// Design to select at startup
    #[arg(long)]
    pub design: Option<String>,

    /// Interpreter to launch instead of bash
    #[arg(long, value_name = "PROGRAM")]
    pub shell: Option<String>,

    /// Keep ANSI escape sequences in shell output
    #[arg(long)]
    pub keep_ansi: bool,

    /// Directory for log files (defaults to logs/ next to the executable)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Applies flags on top of the file settings.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(root) = &self.root {
            config.root = Some(root.clone());
        }
        if let Some(flow_dir) = &self.flow_dir {
            config.flow_dir = flow_dir.clone();
        }
        if let Some(pdk) = &self.pdk {
            config.pdk = Some(pdk.clone());
        }
        if let Some(design) = &self.design {
            config.design = Some(design.clone());
        }
        if let Some(shell) = &self.shell {
            config.shell.program = shell.clone();
        }
        if self.keep_ansi {
            config.strip_ansi = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "flowbridge",
            "--flow-dir",
            "/opt/ORFS/flow",
            "--pdk",
            "asap7",
            "--shell",
            "/bin/bash",
            "--keep-ansi",
        ]);
        let mut config = AppConfig::default();
        config.design = Some("gcd".to_string());
        cli.apply(&mut config);

        assert_eq!(config.flow_dir, PathBuf::from("/opt/ORFS/flow"));
        assert_eq!(config.pdk.as_deref(), Some("asap7"));
        assert_eq!(config.design.as_deref(), Some("gcd"));
        assert_eq!(config.shell.program, "/bin/bash");
        assert!(!config.strip_ansi);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::parse_from(["flowbridge"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }
}
