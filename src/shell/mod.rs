//! Shell session management.
//!
//! This module owns the long-lived interpreter process, forwards command
//! lines to it and frames its merged output into lines.

mod bridge;
mod lines;

pub use bridge::{ShellBridge, ShellCommand, ShellState, anchor_command, quote};
pub use lines::LineSplitter;
