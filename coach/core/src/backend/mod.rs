//! Coach API Backend Integration
//!
//! This module provides access to the career coach server through a common
//! trait interface, so the session controller can be driven by the real HTTP
//! service or by a scripted backend in tests.
//!
//! # Available Backends
//!
//! - **HTTP**: The coach REST API (default `http://localhost:8000`)
//!
//! # Usage
//!
//! ```ignore
//! use coach_core::backend::{ChatRequest, CoachBackend, HttpBackend};
//!
//! let backend = HttpBackend::from_config(&config.server)?;
//! let cancel = CancellationToken::new();
//! let stream = backend.open_stream(&ChatRequest::new("Hello!"), &cancel).await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{
    next_chunk, ByteStream, CareerGuides, ChatReply, ChatRequest, ChunkRead, CoachBackend,
    FormatPreference, HealthStatus, InterviewQuestions, ResumeAnalysis, TextOrList,
    TransportError,
};
