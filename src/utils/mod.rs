//! Utility modules for common functionality.
//!
//! Currently only the logging setup lives here.

pub mod logger;
