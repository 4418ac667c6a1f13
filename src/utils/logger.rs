//! Logging initialization and configuration.
//!
//! Logs are written to files in the `logs/` directory so they never mix with
//! the shell log printed on the terminal. Each run gets its own file.
//!
//! # Configuration
//!
//! The log level can be controlled via the `RUST_LOG` environment variable:
//! - `RUST_LOG=debug` - Show debug and higher level logs (includes every
//!   command sent to the shell)
//! - `RUST_LOG=info` - Show info and higher level logs (default)
//! - `RUST_LOG=warn` - Show warnings and errors only

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system.
///
/// Log files go to `log_dir` when given, otherwise to `logs/` next to the
/// executable, e.g. `logs/flowbridge.2026-10-19-14-30-25.log`.
///
/// Returns the guard of the non-blocking writer; keep it alive for the
/// lifetime of the program or buffered records are lost. Returns `None` when
/// the log file could not be created, in which case logging stays off.
pub fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_dir(),
    };

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        return None;
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_path = log_dir.join(format!("flowbridge.{}.log", timestamp));

    let log_file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {}", e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Logging already initialized: {}", e);
        return None;
    }

    tracing::info!("Logging initialized - writing to {}", log_path.display());
    Some(guard)
}

fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
