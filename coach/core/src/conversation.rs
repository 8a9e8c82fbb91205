//! Conversation State
//!
//! The ordered list of finalized turns plus the single in-flight partial
//! reply that front ends render.
//!
//! # Design Philosophy
//!
//! A finalized [`Turn`] never changes. The reply under construction lives in
//! a [`PartialTurn`] with one owned accumulator; it is either promoted to a
//! `Turn` or discarded, never both. The finalized list is kept behind an
//! `Arc` so a snapshot can be handed to a renderer without copying history on
//! every streamed token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Turn identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    /// Generate a new unique turn ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn_{}", self.0.simple())
    }
}

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// User input
    User,
    /// Career coach reply
    Assistant,
}

impl TurnRole {
    /// Wire name used in `conversation_history`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Out-of-band details the server attaches to a reply
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Action tag chosen by the server (e.g. `resume_analysis_complete`)
    #[serde(default)]
    pub action: Option<String>,
    /// Names of tools used to produce the reply, in order
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Server's explanation of what it did
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Format the reply was written in
    #[serde(default)]
    pub format: Option<String>,
}

impl TurnMetadata {
    /// Metadata carrying only an action tag
    #[must_use]
    pub fn with_action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }
}

/// One finalized message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: TurnId,
    /// Who sent this turn
    pub role: TurnRole,
    /// Message content (possibly markdown)
    pub content: String,
    /// When the turn was finalized
    pub timestamp: DateTime<Utc>,
    /// Action tag
    pub action: Option<String>,
    /// Tools used, in order
    pub tools_used: Vec<String>,
    /// Reasoning text
    pub reasoning: Option<String>,
}

impl Turn {
    /// A user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            action: None,
            tools_used: Vec::new(),
            reasoning: None,
        }
    }

    /// An assistant turn with the given metadata
    #[must_use]
    pub fn assistant(content: impl Into<String>, metadata: TurnMetadata) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            action: metadata.action,
            tools_used: metadata.tools_used,
            reasoning: metadata.reasoning,
        }
    }
}

/// One entry of the `conversation_history` request field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `user` or `assistant`
    pub role: TurnRole,
    /// Turn content
    pub content: String,
}

/// The assistant reply under construction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTurn {
    /// Accumulated content
    pub content: String,
    /// Current server activity, empty once content flows
    pub status: String,
    /// Last metadata record received
    pub metadata: Option<TurnMetadata>,
}

impl PartialTurn {
    /// Append a content delta; content presence supersedes status
    pub fn append(&mut self, delta: &str) {
        self.content.push_str(delta);
        self.status.clear();
    }

    /// Replace the status text
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Store metadata, replacing any earlier record
    pub fn set_metadata(&mut self, metadata: TurnMetadata) {
        self.metadata = Some(metadata);
    }

    /// Replace the whole accumulated content (used by server error events)
    pub fn replace_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.status.clear();
    }

    /// Whether there is anything worth finalizing
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Promote to a finalized assistant turn
    ///
    /// Returns `None` for whitespace-only content. `default_action` fills in
    /// the action tag when the server sent none.
    #[must_use]
    pub fn into_turn(self, default_action: Option<&str>) -> Option<Turn> {
        if !self.has_content() {
            return None;
        }
        let mut metadata = self.metadata.unwrap_or_default();
        if metadata.action.is_none() {
            metadata.action = default_action.map(str::to_string);
        }
        Some(Turn::assistant(self.content, metadata))
    }
}

/// Ordered finalized turns plus the optional in-flight reply
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    turns: Arc<Vec<Turn>>,
    partial: Option<PartialTurn>,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All finalized turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Shared handle to the finalized turns
    #[must_use]
    pub fn shared_turns(&self) -> Arc<Vec<Turn>> {
        Arc::clone(&self.turns)
    }

    /// Number of finalized turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been finalized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a finalized turn
    pub fn push(&mut self, turn: Turn) {
        tracing::debug!(id = %turn.id, role = turn.role.as_str(), len = turn.content.len(), "Turn finalized");
        Arc::make_mut(&mut self.turns).push(turn);
    }

    /// The in-flight reply, if a session is active
    #[must_use]
    pub fn partial(&self) -> Option<&PartialTurn> {
        self.partial.as_ref()
    }

    /// Mutable access to the in-flight reply
    pub fn partial_mut(&mut self) -> Option<&mut PartialTurn> {
        self.partial.as_mut()
    }

    /// Start a fresh in-flight reply, discarding any previous one
    pub fn begin_partial(&mut self) -> &mut PartialTurn {
        self.partial.insert(PartialTurn::default())
    }

    /// Take the in-flight reply out for finalization or discard
    pub fn take_partial(&mut self) -> Option<PartialTurn> {
        self.partial.take()
    }

    /// `{role, content}` pairs for the request, most recent `max` turns
    ///
    /// `max == 0` means the whole history.
    #[must_use]
    pub fn history(&self, max: usize) -> Vec<HistoryEntry> {
        let start = if max == 0 {
            0
        } else {
            self.turns.len().saturating_sub(max)
        };
        self.turns[start..]
            .iter()
            .map(|t| HistoryEntry {
                role: t.role,
                content: t.content.clone(),
            })
            .collect()
    }

    /// Drop every turn and the in-flight reply
    pub fn clear(&mut self) {
        self.turns = Arc::new(Vec::new());
        self.partial = None;
    }
}
