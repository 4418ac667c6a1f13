//! Host platform probe.
//!
//! Shell commands are only issued on a Linux host. The probe reads the
//! `os-release` identity file; a missing file, or a non-Unix build, disables
//! shell commands without stopping the application.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::error::BridgeError;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Ubuntu,
    CentOs,
    Debian,
    /// Has an `os-release` file naming none of the known distributions.
    OtherLinux,
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostPlatform::Ubuntu => "Ubuntu",
            HostPlatform::CentOs => "CentOS",
            HostPlatform::Debian => "Debian",
            HostPlatform::OtherLinux => "Unknown Linux distribution",
        };
        f.write_str(name)
    }
}

impl HostPlatform {
    /// Identifies the distribution from the contents of `os-release`.
    pub fn from_os_release(content: &str) -> Self {
        let content = content.to_lowercase();
        if content.contains("ubuntu") {
            HostPlatform::Ubuntu
        } else if content.contains("centos") {
            HostPlatform::CentOs
        } else if content.contains("debian") {
            HostPlatform::Debian
        } else {
            HostPlatform::OtherLinux
        }
    }
}

/// Probes the host using the identity file at `os_release`.
pub fn probe(os_release: &Path) -> Result<HostPlatform, BridgeError> {
    if !cfg!(unix) {
        return Err(BridgeError::UnsupportedPlatform {
            reason: "shell commands need a Unix-like host".to_string(),
        });
    }

    match fs::read_to_string(os_release) {
        Ok(content) => {
            let platform = HostPlatform::from_os_release(&content);
            info!(%platform, "Host platform detected");
            Ok(platform)
        }
        Err(e) => {
            warn!("Platform probe failed on {}: {}", os_release.display(), e);
            let reason = match e.kind() {
                io::ErrorKind::NotFound => format!("{} not found", os_release.display()),
                _ => format!("cannot read {}: {}", os_release.display(), e),
            };
            Err(BridgeError::UnsupportedPlatform { reason })
        }
    }
}
