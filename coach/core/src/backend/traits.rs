//! Coach Backend Traits
//!
//! Trait definitions for the remote coach API. This abstraction lets the
//! stream controller run against the real HTTP service or a scripted stand-in
//! without changing core logic.
//!
//! # Design Philosophy
//!
//! The `CoachBackend` trait provides a common interface for:
//! - Opening the streamed chat response as raw byte chunks
//! - The non-streamed collaborators (enhanced chat, tools, health)
//!
//! Decoding the stream is NOT the backend's job. It hands back bytes exactly
//! as the transport delivered them, and the controller owns everything from
//! there on.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::conversation::HistoryEntry;

/// Raw body chunks in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Transport-level failure
#[derive(Debug, Error)]
pub enum TransportError {
    /// The caller cancelled the request
    #[error("request aborted")]
    Aborted,

    /// Connection, DNS, TLS or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },
}

impl TransportError {
    /// Whether this is the distinguished cancellation condition
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Result of one read from a [`ByteStream`]
#[derive(Debug)]
pub enum ChunkRead {
    /// Next body chunk
    Chunk(Bytes),
    /// Body ended normally
    End,
    /// Cancellation token fired while waiting
    Aborted,
    /// Transport failed mid-body
    Failed(TransportError),
}

/// Read the next chunk, honoring cancellation at the suspension point
///
/// Cancellation wins over a chunk that is ready at the same moment, so no
/// byte is handed out after the token fires.
pub async fn next_chunk(stream: &mut ByteStream, cancel: &CancellationToken) -> ChunkRead {
    tokio::select! {
        biased;
        () = cancel.cancelled() => ChunkRead::Aborted,
        item = stream.next() => match item {
            Some(Ok(bytes)) => ChunkRead::Chunk(bytes),
            Some(Err(TransportError::Aborted)) => ChunkRead::Aborted,
            Some(Err(e)) => ChunkRead::Failed(e),
            None => ChunkRead::End,
        },
    }
}

/// How the server should format replies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatPreference {
    /// Markdown (default)
    #[default]
    Markdown,
    /// Plain text
    Plain,
    /// Code block
    Code,
}

impl FormatPreference {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Plain => "plain",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for FormatPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "plain" | "text" => Ok(Self::Plain),
            "code" => Ok(Self::Code),
            other => Err(format!(
                "unknown format '{other}' (expected markdown, plain or code)"
            )),
        }
    }
}

/// Body of a chat request (streamed and enhanced)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
    /// Prior turns, oldest first
    pub conversation_history: Vec<HistoryEntry>,
    /// Reply format
    pub format_preference: FormatPreference,
    /// Let the server pick tools on its own
    pub auto_tool_selection: bool,
}

impl ChatRequest {
    /// Create a request with default preferences and no history
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_history: Vec::new(),
            format_preference: FormatPreference::default(),
            auto_tool_selection: true,
        }
    }

    /// Set history
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.conversation_history = history;
        self
    }

    /// Set format preference
    #[must_use]
    pub fn with_format(mut self, format: FormatPreference) -> Self {
        self.format_preference = format;
        self
    }

    /// Set automatic tool selection
    #[must_use]
    pub fn with_auto_tools(mut self, enabled: bool) -> Self {
        self.auto_tool_selection = enabled;
        self
    }
}

/// Reply from the non-streamed enhanced chat endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Reply text
    pub response: String,
    /// Action tag
    #[serde(default)]
    pub action: Option<String>,
    /// Format the reply was written in
    #[serde(default)]
    pub format: Option<String>,
    /// Tools used
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Server reasoning
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Tool output that is either one block of text or a list of items
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    /// One block of text (model-generated)
    Text(String),
    /// Discrete items (rule-based or retrieved)
    List(Vec<String>),
}

impl Default for TextOrList {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl TextOrList {
    /// Render as text, one item per line for lists
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Resume analysis result
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    /// Feedback text or bullet points
    #[serde(default)]
    pub feedback: TextOrList,
    /// `llm_enhanced` or `rule_based`
    #[serde(default)]
    pub analysis_type: Option<String>,
    /// Length of the submitted resume in characters
    #[serde(default)]
    pub resume_length: Option<u64>,
}

/// Mock interview questions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewQuestions {
    /// Questions text or list
    #[serde(default)]
    pub questions: TextOrList,
    /// Position the questions target
    #[serde(default)]
    pub position: Option<String>,
    /// `llm_enhanced` or `predefined`
    #[serde(default)]
    pub generation_type: Option<String>,
}

/// Featured career guide tips
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerGuides {
    /// Tips text or list
    #[serde(default)]
    pub tips: TextOrList,
    /// Source documents
    #[serde(default)]
    pub sources: Vec<String>,
    /// Query that was answered
    #[serde(default)]
    pub query: Option<String>,
    /// `rag_enhanced` or `raw_retrieval`
    #[serde(default)]
    pub generation_type: Option<String>,
}

/// Health probe result
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `healthy` when the server is up
    #[serde(default)]
    pub status: String,
    /// Whether a language model provider is configured
    #[serde(default)]
    pub llm_available: bool,
}

impl HealthStatus {
    /// Whether the server reported itself healthy
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Coach backend trait
///
/// Implement this trait to point the controller at a different transport.
#[async_trait]
pub trait CoachBackend: Send + Sync {
    /// Get the backend name (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Probe the server
    async fn health(&self) -> anyhow::Result<HealthStatus>;

    /// Open the streamed chat response
    ///
    /// Resolves once response headers are in. The handshake itself honors
    /// `cancel` and reports [`TransportError::Aborted`] when it fires.
    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, TransportError>;

    /// Send a chat request and wait for the complete reply (non-streaming)
    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatReply>;

    /// Analyze resume text
    async fn analyze_resume(&self, resume_text: &str) -> anyhow::Result<ResumeAnalysis>;

    /// Generate interview questions for a position
    async fn mock_interview(&self, position: &str) -> anyhow::Result<InterviewQuestions>;

    /// Retrieve featured career guide tips for a query
    async fn featured_guides(&self, query: &str, top_k: u32) -> anyhow::Result<CareerGuides>;
}
