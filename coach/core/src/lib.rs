//! Coach Core - Streaming Client for the Career Coach Assistant
//!
//! This crate provides the conversation core of the career coach client,
//! completely independent of any UI framework. It can drive a terminal front
//! end, a GUI, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Presentation Layer                          │
//! │        (coach-cli, tests, anything that renders snapshots)       │
//! └───────────────┬───────────────────────────────▲──────────────────┘
//!                 │ send / cancel / clear          │ ConversationSnapshot
//! ┌───────────────▼───────────────────────────────┴──────────────────┐
//! │                          COACH CORE                              │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                    StreamController                        │  │
//! │  │  ┌──────────────┐  ┌───────────────┐  ┌─────────────────┐  │  │
//! │  │  │ Conversation │  │ EventPipeline │  │  CoachBackend   │  │  │
//! │  │  │    State     │  │ bytes→events  │  │  (HTTP, mocks)  │  │  │
//! │  │  └──────────────┘  └───────────────┘  └─────────────────┘  │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamController`]: Runs one streamed turn at a time and finalizes it once
//! - [`ConversationSnapshot`]: What a renderer needs after every transition
//! - [`Turn`]: A finalized user or assistant message
//! - [`StreamEvent`]: One decoded event of the streamed protocol
//! - [`CoachBackend`]: Transport seam; [`HttpBackend`] talks to the real API
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use coach_core::{load_config, HttpBackend, StreamController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = HttpBackend::from_config(&config.server)?;
//!     let controller = Arc::new(StreamController::new(backend, config.chat));
//!
//!     let mut updates = controller.subscribe();
//!     tokio::spawn(async move {
//!         while updates.changed().await.is_ok() {
//!             let snapshot = updates.borrow().clone();
//!             // render snapshot.partial / snapshot.turns
//!         }
//!     });
//!
//!     let outcome = controller.send("How do I prepare for interviews?").await?;
//!     println!("{:?}", outcome.turn());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Coach API abstraction and the HTTP implementation
//! - [`config`]: TOML + environment + CLI configuration
//! - [`controller`]: The stream session state machine
//! - [`conversation`]: Turns, the partial reply, history
//! - [`streaming`]: Chunk decoding, line reassembly and event parsing
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on terminal or UI frameworks. It's
//! pure client logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod streaming;

// Re-exports for convenience
pub use backend::{
    ChatReply, ChatRequest, CoachBackend, FormatPreference, HealthStatus, HttpBackend,
    TransportError,
};
pub use controller::{
    CoachError, ConversationSnapshot, SessionId, SessionOutcome, SessionPhase, SessionStats,
    StreamController, ERROR_ACTION,
};
pub use conversation::{
    Conversation, HistoryEntry, PartialTurn, Turn, TurnId, TurnMetadata, TurnRole,
};
pub use streaming::{EventPipeline, ParsedLine, StatusKind, StreamEvent};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, CoachConfig, CoachToml,
    ConfigError, ConfigOverrides, ConfigSource, ServerConfig,
};
