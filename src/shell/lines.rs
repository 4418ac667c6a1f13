//! Line framing for the merged shell output stream.
//!
//! The reader thread hands over raw byte chunks with arbitrary boundaries.
//! `LineSplitter` turns them into complete lines, buffering a trailing partial
//! line until its terminator arrives. Splitting happens on bytes, before
//! decoding, so a multi-byte character cut in half by a chunk boundary still
//! decodes correctly.

use tracing::warn;

use crate::output::PROMPT_SUFFIX;

#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, in arrival order.
    ///
    /// Lines are returned without their `\n` (or `\r\n`) terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(decode_line(&self.pending));
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Release the buffered partial line if it is an interpreter prompt.
    ///
    /// Prompts never end with a newline, so without this they would only show
    /// up once the next command's output arrives. This breaks chunking
    /// invariance for a partial line that happens to end in the prompt suffix
    /// and later continues; callers that need strict framing use `push` and
    /// `finish` only.
    pub fn flush_prompt(&mut self) -> Option<String> {
        if self.pending.ends_with(PROMPT_SUFFIX.as_bytes()) {
            let line = decode_line(&self.pending);
            self.pending.clear();
            Some(line)
        } else {
            None
        }
    }

    /// Release whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        Some(line)
    }

    /// Bytes buffered for a line that has not been terminated yet.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\u{FFFD}') && !contains_literal_replacement(bytes) {
        warn!("Replaced invalid UTF-8 in shell output ({} bytes)", bytes.len());
    }
    text.into_owned()
}

/// U+FFFD encoded in UTF-8, for telling real replacement characters apart
/// from ones produced by lossy decoding.
fn contains_literal_replacement(bytes: &[u8]) -> bool {
    bytes.windows(3).any(|w| w == [0xEF, 0xBF, 0xBD])
}
