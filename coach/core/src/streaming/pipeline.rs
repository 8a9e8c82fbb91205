//! Bytes-to-events pipeline
//!
//! Chains the chunk decoder, line reassembler and event parser so a caller
//! can feed transport chunks in and take parsed lines out, with no transport
//! in sight.

use super::decoder::ChunkDecoder;
use super::lines::LineReassembler;
use super::parser::{parse_line, ParsedLine};

/// Decoder + reassembler + parser for one stream
#[derive(Clone, Debug, Default)]
pub struct EventPipeline {
    decoder: ChunkDecoder,
    lines: LineReassembler,
}

impl EventPipeline {
    /// Create a pipeline for a fresh stream
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning the lines it completed, parsed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParsedLine> {
        let text = self.decoder.decode(chunk);
        if text.is_empty() {
            return Vec::new();
        }
        self.lines
            .push(&text)
            .iter()
            .map(|line| parse_line(line))
            .collect()
    }

    /// Flush everything still buffered at end of stream
    ///
    /// The decoder carry is pushed through the reassembler first, then an
    /// unterminated final line is parsed like any other, so a last
    /// `data:` record that lost its newline is still honored.
    pub fn finish(&mut self) -> Vec<ParsedLine> {
        let mut parsed = Vec::new();

        if let Some(text) = self.decoder.finish() {
            parsed.extend(self.lines.push(&text).iter().map(|line| parse_line(line)));
        }
        if let Some(tail) = self.lines.finish() {
            tracing::debug!(len = tail.len(), "Parsing unterminated final line");
            parsed.push(parse_line(&tail));
        }

        parsed
    }
}
