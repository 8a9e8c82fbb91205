//! Line Reassembler
//!
//! Buffers decoded text and hands back complete newline-terminated records.
//! Whatever follows the last newline stays pending until the next fragment.

/// Owned text buffer with a pending-fragment carry
#[derive(Clone, Debug, Default)]
pub struct LineReassembler {
    buffer: String,
}

impl LineReassembler {
    /// Create an empty reassembler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received after the last newline
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Append a fragment and return every line it completed, in order
    ///
    /// Lines are returned without their terminator. A trailing `\r` is
    /// dropped as well so CRLF-framed streams read the same as LF ones.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        let carried = self.buffer.len();
        self.buffer.push_str(fragment);

        // Only the new fragment can hold a newline; the carry has none
        let Some(last_newline) = fragment.rfind('\n').map(|i| carried + i) else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split_terminator('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// Surface the unterminated tail at end of stream
    ///
    /// Returns `None` when nothing is pending. The reassembler is empty
    /// afterwards.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.buffer);
        Some(tail.strip_suffix('\r').map(str::to_string).unwrap_or(tail))
    }
}
