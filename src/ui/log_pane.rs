//! Log sinks for classified shell output.
//!
//! The application talks to a [`LogSink`] only, so the bridge and classifier
//! stay independent of how lines end up on screen.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::SetTitle;

use crate::output::{LineClass, StatusIndicator};

/// Where a log entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A line of shell output with its classification.
    Output(LineClass),
    /// Message from the application itself.
    Notice,
    /// Unstyled text produced by the application, such as file contents.
    Plain,
    /// A reported error (spawn, write, platform, flow file operations).
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub text: String,
}

impl LogEntry {
    pub fn output(class: LineClass, text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Output(class),
            text: text.into(),
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Notice,
            text: text.into(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Plain,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Failure,
            text: text.into(),
        }
    }
}

pub trait LogSink {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()>;

    fn set_status(&mut self, status: StatusIndicator) -> io::Result<()>;
}

/// Renders entries as colored lines and mirrors the status indicator in the
/// terminal title.
pub struct ConsolePane<W: Write> {
    out: W,
    status: StatusIndicator,
}

impl ConsolePane<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsolePane<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            status: StatusIndicator::Unset,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LogSink for ConsolePane<W> {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let (color, attribute) = match entry.kind {
            EntryKind::Output(LineClass::Prompt) => (Some(Color::Cyan), Some(Attribute::Bold)),
            EntryKind::Output(LineClass::ErrorLike) => (Some(Color::Red), None),
            EntryKind::Output(LineClass::Normal) | EntryKind::Plain => (None, None),
            EntryKind::Notice => (Some(Color::Yellow), Some(Attribute::Underlined)),
            EntryKind::Failure => (Some(Color::DarkYellow), Some(Attribute::Bold)),
        };

        if let Some(color) = color {
            queue!(self.out, SetForegroundColor(color))?;
        }
        if let Some(attribute) = attribute {
            queue!(self.out, SetAttribute(attribute))?;
        }
        queue!(self.out, Print(&entry.text))?;
        if color.is_some() || attribute.is_some() {
            queue!(self.out, SetAttribute(Attribute::Reset), ResetColor)?;
        }
        queue!(self.out, Print("\n"))?;
        self.out.flush()
    }

    fn set_status(&mut self, status: StatusIndicator) -> io::Result<()> {
        if status == self.status {
            return Ok(());
        }
        self.status = status;
        queue!(self.out, SetTitle(format!("flowbridge [{}]", status.label())))?;
        self.out.flush()
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryPane {
    pub entries: Vec<LogEntry>,
    pub status: StatusIndicator,
    /// Every status update, including repeats.
    pub status_history: Vec<StatusIndicator>,
}

impl MemoryPane {
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.text.as_str()).collect()
    }

    pub fn output_lines(&self) -> Vec<(LineClass, &str)> {
        self.entries
            .iter()
            .filter_map(|e| match e.kind {
                EntryKind::Output(class) => Some((class, e.text.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for MemoryPane {
    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn set_status(&mut self, status: StatusIndicator) -> io::Result<()> {
        self.status = status;
        self.status_history.push(status);
        Ok(())
    }
}
