//! Incremental Event-Stream Decoding
//!
//! Everything between the raw HTTP body and a typed [`StreamEvent`]:
//!
//! ```text
//!   transport chunks (bytes)
//!            │
//!            ▼
//!   ┌─────────────────┐   split UTF-8 sequences carried over
//!   │  ChunkDecoder   │
//!   └────────┬────────┘
//!            ▼
//!   ┌─────────────────┐   unterminated tail carried over
//!   │ LineReassembler │
//!   └────────┬────────┘
//!            ▼
//!   ┌─────────────────┐   `data: {json}` → StreamEvent
//!   │   parse_line    │
//!   └────────┬────────┘
//!            ▼
//!       ParsedLine
//! ```
//!
//! Each stage is a small owned state object so it can be tested on its own.
//! [`EventPipeline`] wires the three together for the session controller.

mod decoder;
mod event;
mod lines;
mod parser;
mod pipeline;

pub use decoder::ChunkDecoder;
pub use event::{StatusKind, StreamEvent};
pub use lines::LineReassembler;
pub use parser::{parse_line, ParsedLine, DATA_MARKER};
pub use pipeline::EventPipeline;
