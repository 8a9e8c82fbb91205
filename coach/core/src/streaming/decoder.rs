//! Chunk Decoder
//!
//! Turns raw byte chunks from the transport into text. A UTF-8 sequence that
//! straddles a chunk boundary is held back and completed by the next chunk,
//! so no boundary ever corrupts a character.

/// Longest UTF-8 encoded code point
const MAX_UTF8_LEN: usize = 4;

/// Incremental UTF-8 decoder with a carry for split code points
#[derive(Clone, Debug, Default)]
pub struct ChunkDecoder {
    /// Leading bytes of a code point whose continuation has not arrived yet
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Create a decoder with an empty carry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently carried to the next chunk
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode one chunk, returning all text that is complete so far
    ///
    /// Bytes that are definitely invalid decode to U+FFFD. An incomplete
    /// sequence at the very end of the chunk is retained for the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    if let Some(bad) = e.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[bad..];
                    } else {
                        // Truncated sequence at the end of input
                        debug_assert!(after.len() < MAX_UTF8_LEN);
                        self.pending.extend_from_slice(after);
                        break;
                    }
                }
            }
        }

        out
    }

    /// Flush the carry at end of stream
    ///
    /// A sequence that never completed is decoded best-effort with
    /// replacement characters instead of being dropped.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        tracing::debug!(bytes = tail.len(), "Flushing incomplete UTF-8 sequence at end of stream");
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = ChunkDecoder::new();
        assert_eq!(decoder.decode(b"data: hi\n"), "data: hi\n");
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_split_multibyte_character() {
        let text = "résumé ✅";
        let bytes = text.as_bytes();

        // Split inside the three-byte check mark
        let split = bytes.len() - 1;
        let mut decoder = ChunkDecoder::new();
        let first = decoder.decode(&bytes[..split]);
        assert_eq!(decoder.pending_len(), 2);
        let second = decoder.decode(&bytes[split..]);

        assert_eq!(format!("{first}{second}"), text);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let text = "📄 Calling résumé tool…";
        let mut decoder = ChunkDecoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        assert!(decoder.finish().is_none());
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_byte_mid_chunk() {
        let mut decoder = ChunkDecoder::new();
        let out = decoder.decode(b"ok\xFFok");
        assert_eq!(out, "ok\u{FFFD}ok");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_truncated_tail_is_not_dropped() {
        let mut decoder = ChunkDecoder::new();
        // First two bytes of a three-byte sequence
        let out = decoder.decode(&[b'a', 0xE2, 0x9C]);
        assert_eq!(out, "a");

        let tail = decoder.finish().expect("tail should be surfaced");
        assert!(tail.contains(char::REPLACEMENT_CHARACTER));
        assert_eq!(decoder.pending_len(), 0);
    }
}
