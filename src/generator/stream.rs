//! Newline-delimited JSON decoding for streamed generator bodies.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a newline arrives. Each complete line is decoded on its own; blank lines
//! and lines that are not valid JSON are dropped.

use serde::Deserialize;
use tracing::debug;

/// One decoded object of a streamed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Fragment {
    /// Text fragment.
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the final object.
    #[serde(default)]
    pub done: bool,
    /// Error reported mid-stream.
    #[serde(default)]
    pub error: Option<String>,
}

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and drains every complete line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
            self.scanned = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Returns the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.scanned = 0;
        let tail = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

/// Decodes one line; `None` for blank or malformed lines.
#[must_use]
pub fn decode_line(line: &str) -> Option<Fragment> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            debug!(error = %e, len = line.len(), "Skipping malformed stream line");
            None
        }
    }
}
