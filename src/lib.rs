//! flowbridge - a terminal front end for an RTL-to-GDSII flow
//!
//! This library provides the pieces of flowbridge:
//! - A bridge to one long-lived interactive shell (commands in, merged
//!   stdout/stderr out)
//! - Line framing and classification of the shell's output
//! - Flow actions: make targets, design import and per-design file templating
//! - The application controller and its log sinks
//!
//! # Example
//!
//! ```no_run
//! use flowbridge::event::init_app_eventsource;
//! use flowbridge::output::{classify, LineClass};
//! use flowbridge::shell::{LineSplitter, ShellBridge, ShellCommand};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let (event_sink, _app_events) = init_app_eventsource();
//!     let mut bridge = ShellBridge::new(ShellCommand::default());
//!     let mut output = bridge.start(event_sink)?;
//!
//!     bridge.send_anchored(std::path::Path::new("/tmp"), "ls")?;
//!
//!     let mut splitter = LineSplitter::new();
//!     while let Some(chunk) = output.recv().await {
//!         for line in splitter.push(&chunk) {
//!             if classify(&line) == LineClass::ErrorLike {
//!                 eprintln!("{line}");
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod flow;
pub mod output;
pub mod platform;
pub mod shell;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use app::App;
pub use config::AppConfig;
pub use error::{BridgeError, ConfigError, FlowError};
pub use event::{AppEvent, init_app_eventsource, init_user_input};
pub use output::{LineClass, StatusIndicator, classify};
pub use shell::{LineSplitter, ShellBridge, ShellCommand, ShellState};
