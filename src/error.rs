//! Error taxonomy for the shell bridge.
//!
//! None of these errors terminate the host application. They are rendered
//! into the log pane as user-readable messages; only the shell session itself
//! may end up `Stopped`.
//!
//! Malformed output bytes never surface here: output is decoded lossily and
//! invalid sequences become U+FFFD so the log stream stays alive.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The interpreter could not be started. Fatal for the session.
    #[error("failed to start shell `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Writing a command to the shell failed. The command is dropped.
    #[error("failed to send command to shell: {source}")]
    Write {
        #[source]
        source: io::Error,
    },

    /// The host platform probe failed; shell commands are disabled.
    #[error("unsupported platform: {reason}")]
    UnsupportedPlatform { reason: String },

    /// `start()` was called on a session that already ran once.
    #[error("shell session was already started")]
    AlreadyStarted,
}

impl BridgeError {
    /// Write error for a session that has no live input stream.
    pub(crate) fn not_running() -> Self {
        BridgeError::Write {
            source: io::Error::new(io::ErrorKind::NotConnected, "shell is not running"),
        }
    }

    /// True for errors after which the session can no longer accept commands.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Spawn { .. })
    }
}

/// Errors raised by flow file operations (design import, template resets).
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("select a design and a PDK first")]
    NoSelection,

    #[error("reference file {} is missing, unable to copy reference content", .0.display())]
    MissingReference(PathBuf),

    #[error("{} is not a valid directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("no .v files found in {}", .0.display())]
    NoVerilogSources(PathBuf),

    #[error("{} contains the import destination {}", .dir.display(), .destination.display())]
    OverlappingImport { dir: PathBuf, destination: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FlowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FlowError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while loading the JSON configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
