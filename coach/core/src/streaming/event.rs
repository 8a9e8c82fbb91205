//! Stream Events
//!
//! One decoded unit of the coach API's streamed protocol.

use serde::{Deserialize, Serialize};

use crate::conversation::TurnMetadata;

/// What the server is busy with while no content has arrived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Request received, analysis starting
    Thinking,
    /// Intent of the user query recognized
    Intent,
    /// Work under way for the recognized intent
    Processing,
    /// A tool is being invoked
    ToolCall,
    /// A tool returned
    ToolResult,
    /// The language model is generating the reply
    LlmProcessing,
}

impl StatusKind {
    /// Map a wire `type` value onto a status kind
    #[must_use]
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "thinking" => Some(Self::Thinking),
            "intent" => Some(Self::Intent),
            "processing" => Some(Self::Processing),
            "tool_call" => Some(Self::ToolCall),
            "tool_result" => Some(Self::ToolResult),
            "llm_processing" => Some(Self::LlmProcessing),
            _ => None,
        }
    }

    /// The wire `type` value for this kind
    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Intent => "intent",
            Self::Processing => "processing",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::LlmProcessing => "llm_processing",
        }
    }
}

/// A parsed stream event
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Replace the displayed status text
    Status {
        /// Which activity the server reported
        kind: StatusKind,
        /// Human-readable status line
        text: String,
    },
    /// Text to append to the reply under construction
    ContentDelta(String),
    /// Out-of-band details about the reply
    Metadata(TurnMetadata),
    /// Server-side failure; the message (if any) replaces the reply
    ///
    /// A missing or blank message still ends the reply as an error: the
    /// controller substitutes the configured apology so the user sees a turn.
    Error(Option<String>),
    /// Explicit successful end of the reply
    Done,
}

impl StreamEvent {
    /// Short label used in logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Status { kind, .. } => kind.as_wire(),
            Self::ContentDelta(_) => "content",
            Self::Metadata(_) => "metadata",
            Self::Error(_) => "error",
            Self::Done => "done",
        }
    }

    /// Whether this event ends the reply on its own
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
