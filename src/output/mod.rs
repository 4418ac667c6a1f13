//! Shell output presentation.
//!
//! Turns decoded output lines into display categories and keeps the status
//! indicator in sync with the most recent line.

mod ansi;
mod classifier;

pub use ansi::strip_ansi_codes;
pub use classifier::{ERROR_KEYWORDS, LineClass, PROMPT_SUFFIX, StatusIndicator, classify};
