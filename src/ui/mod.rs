//! Presentation of the shell log.

mod log_pane;

pub use log_pane::{ConsolePane, EntryKind, LogEntry, LogSink, MemoryPane};
