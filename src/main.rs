//! Main entry point for flowbridge.
//!
//! Parses flags, loads settings, starts the shell session and runs the
//! application loop on a single-threaded runtime until the user quits.

use anyhow::{Context, Result};
use clap::Parser;

use flowbridge::cli::Cli;
use flowbridge::ui::ConsolePane;
use flowbridge::utils::logger;
use flowbridge::{App, AppConfig, init_user_input};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log records get written on exit
    let _log_guard = logger::init_logging(cli.log_dir.as_deref());

    let mut config = AppConfig::discover(cli.config.as_deref()).context("Failed to load settings")?;
    cli.apply(&mut config);

    let root = match config.root.clone() {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine the current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Root directory {} is not accessible", root.display()))?;

    let mut app = App::new(&config, root, ConsolePane::stdout());
    app.run(init_user_input()).await
}
