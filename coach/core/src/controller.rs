//! Stream Session Controller
//!
//! Drives one conversation turn at a time against a [`CoachBackend`]:
//! issues the request, reads the body chunk by chunk, applies parsed events to
//! the conversation, and finalizes the turn exactly once.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle ──send()──▶ Sending ──headers──▶ Streaming ──done/EOF/error/cancel──▶ Finalizing ──▶ Idle
//! ```
//!
//! # Design Philosophy
//!
//! The controller is shared behind `Arc` and every method takes `&self`. The
//! task that called [`StreamController::send`] owns the read loop; any other
//! task may call [`StreamController::cancel`] or [`StreamController::clear`]
//! at any time. State lives behind a `parking_lot::Mutex` that is only held
//! between suspension points, and every transition publishes a fresh
//! [`ConversationSnapshot`] on a watch channel for renderers.
//!
//! A session leaves the `active` slot exactly once, in `finalize` or in
//! `clear`, and whoever takes it decides the outcome. Events or finalization
//! attempts for a session that is no longer in the slot are dropped.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{
    next_chunk, ChatReply, ChatRequest, ChunkRead, CoachBackend, FormatPreference,
};
use crate::config::ChatConfig;
use crate::conversation::{Conversation, PartialTurn, Turn, TurnMetadata};
use crate::streaming::{EventPipeline, ParsedLine, StreamEvent};

/// Action tag attached to turns produced by a failure
pub const ERROR_ACTION: &str = "error";

/// Session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0.simple())
    }
}

/// Where the controller is in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session; ready for input
    #[default]
    Idle,
    /// Request issued, waiting for response headers
    Sending,
    /// Reading the response body
    Streaming,
    /// Terminal event seen; turn being settled
    Finalizing,
}

impl SessionPhase {
    /// Whether a new message can be sent
    #[must_use]
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// Consistent view of the conversation for renderers
#[derive(Clone, Debug, Default)]
pub struct ConversationSnapshot {
    /// Controller phase at the time of the snapshot
    pub phase: SessionPhase,
    /// Finalized turns, oldest first
    pub turns: Arc<Vec<Turn>>,
    /// Reply under construction, if a session is active
    pub partial: Option<PartialTurn>,
}

impl ConversationSnapshot {
    /// Current status text, empty when none
    #[must_use]
    pub fn status(&self) -> &str {
        self.partial.as_ref().map_or("", |p| p.status.as_str())
    }
}

/// Rejected requests
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoachError {
    /// A session is still in flight
    #[error("a reply is still streaming; wait for it or cancel it first")]
    SessionActive,

    /// Nothing to send
    #[error("message is empty")]
    EmptyInput,
}

/// How a session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Reply finalized from streamed content
    Completed(Turn),
    /// Server reported an error; its message became the turn
    ServerError(Turn),
    /// Transport failed; the configured apology became the turn
    TransportFailed(Turn),
    /// Stream ended without content; nothing appended
    Empty,
    /// Cancelled or cleared; nothing appended
    Cancelled,
}

impl SessionOutcome {
    /// The assistant turn appended by this session, if any
    #[must_use]
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            Self::Completed(turn) | Self::ServerError(turn) | Self::TransportFailed(turn) => {
                Some(turn)
            }
            Self::Empty | Self::Cancelled => None,
        }
    }
}

/// Counters for one session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Transport chunks read
    pub chunks: u64,
    /// Body bytes read
    pub bytes: u64,
    /// Events applied to the partial turn
    pub events: u64,
    /// Data records that failed to parse
    pub malformed: u64,
    /// Well-formed records with an unknown type
    pub unrecognized: u64,
    /// Wall time from send to finalization
    pub elapsed_ms: u64,
}

/// How the read loop (or turn-based call) stopped
enum SessionEnd {
    /// `done` or end of body
    Completed,
    /// Cancel token fired or session was cleared
    Cancelled,
    /// Transport or request failure
    Failed(String),
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    terminated: bool,
    errored: bool,
    stats: SessionStats,
    started: Instant,
}

impl ActiveSession {
    fn new() -> Self {
        Self {
            id: SessionId::new(),
            cancel: CancellationToken::new(),
            terminated: false,
            errored: false,
            stats: SessionStats::default(),
            started: Instant::now(),
        }
    }

    fn finish_stats(&mut self) -> SessionStats {
        self.stats.elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.stats
    }
}

struct Shared {
    conversation: Conversation,
    phase: SessionPhase,
    chat: ChatConfig,
    active: Option<ActiveSession>,
    last_stats: Option<SessionStats>,
}

impl Shared {
    /// The active session if it is `id` and still live
    fn live_session(&mut self, id: SessionId) -> Option<&mut ActiveSession> {
        self.active
            .as_mut()
            .filter(|s| s.id == id && !s.terminated && !s.cancel.is_cancelled())
    }
}

/// Single-session streaming controller
pub struct StreamController<B: CoachBackend> {
    backend: Arc<B>,
    shared: Mutex<Shared>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
}

impl<B: CoachBackend> StreamController<B> {
    /// Create a controller over `backend`
    pub fn new(backend: B, chat: ChatConfig) -> Self {
        Self::with_shared_backend(Arc::new(backend), chat)
    }

    /// Create a controller over a backend that is shared elsewhere
    pub fn with_shared_backend(backend: Arc<B>, chat: ChatConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(ConversationSnapshot::default());
        Self {
            backend,
            shared: Mutex::new(Shared {
                conversation: Conversation::new(),
                phase: SessionPhase::Idle,
                chat,
                active: None,
                last_stats: None,
            }),
            snapshot_tx,
        }
    }

    /// The backend, for the non-conversational collaborator calls
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    /// Whether a session is in flight
    pub fn is_active(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive a snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Finalized turns
    pub fn turns(&self) -> Arc<Vec<Turn>> {
        self.shared.lock().conversation.shared_turns()
    }

    /// Counters of the most recently finished session
    pub fn last_session_stats(&self) -> Option<SessionStats> {
        self.shared.lock().last_stats
    }

    /// Current chat preferences
    pub fn chat_config(&self) -> ChatConfig {
        self.shared.lock().chat.clone()
    }

    /// Change the format requested for subsequent messages
    pub fn set_format_preference(&self, format: FormatPreference) {
        self.shared.lock().chat.format_preference = format;
    }

    /// Toggle automatic tool selection for subsequent messages
    pub fn set_auto_tool_selection(&self, enabled: bool) {
        self.shared.lock().chat.auto_tool_selection = enabled;
    }

    /// Cancel the in-flight session
    ///
    /// Returns `false` when there is nothing to cancel. The session's task
    /// observes the token at its next suspension point, discards the partial
    /// reply and returns [`SessionOutcome::Cancelled`].
    pub fn cancel(&self) -> bool {
        let mut shared = self.shared.lock();
        match shared.active.as_mut() {
            Some(session) if !session.terminated => {
                session.terminated = true;
                session.cancel.cancel();
                tracing::info!(session = %session.id, "Session cancelled");
                true
            }
            _ => false,
        }
    }

    /// Drop the whole conversation
    ///
    /// An active session is terminated first so its late finalization
    /// cannot append to the cleared list.
    pub fn clear(&self) {
        let mut shared = self.shared.lock();
        if let Some(mut session) = shared.active.take() {
            session.cancel.cancel();
            shared.last_stats = Some(session.finish_stats());
            tracing::info!(session = %session.id, "Session terminated by clear");
        }
        shared.conversation.clear();
        shared.phase = SessionPhase::Idle;
        self.publish(&shared);
        tracing::debug!("Conversation cleared");
    }

    /// Send a message and stream the reply
    ///
    /// Resolves once the session is back to idle.
    ///
    /// # Errors
    ///
    /// [`CoachError::EmptyInput`] for blank input and
    /// [`CoachError::SessionActive`] while another session is in flight.
    /// Transport and server failures are not errors here; they end up in the
    /// returned [`SessionOutcome`].
    pub async fn send(&self, input: &str) -> Result<SessionOutcome, CoachError> {
        let (id, cancel, request) = self.begin(input)?;

        let mut stream = match self.backend.open_stream(&request, &cancel).await {
            Ok(stream) => stream,
            Err(e) if e.is_aborted() => return Ok(self.finalize(id, SessionEnd::Cancelled)),
            Err(e) => return Ok(self.finalize(id, SessionEnd::Failed(e.to_string()))),
        };

        if !self.enter_streaming(id) {
            return Ok(self.finalize(id, SessionEnd::Cancelled));
        }

        let mut pipeline = EventPipeline::new();
        let end = loop {
            match next_chunk(&mut stream, &cancel).await {
                ChunkRead::Chunk(bytes) => {
                    let parsed = pipeline.feed(&bytes);
                    if let ControlFlow::Break(end) = self.apply(id, bytes.len(), parsed) {
                        break end;
                    }
                }
                ChunkRead::End => {
                    let parsed = pipeline.finish();
                    break match self.apply(id, 0, parsed) {
                        ControlFlow::Break(end) => end,
                        ControlFlow::Continue(()) => SessionEnd::Completed,
                    };
                }
                ChunkRead::Aborted => break SessionEnd::Cancelled,
                ChunkRead::Failed(e) => break SessionEnd::Failed(e.to_string()),
            }
        };
        drop(stream);

        Ok(self.finalize(id, end))
    }

    /// Send a message through the non-streamed enhanced chat endpoint
    ///
    /// Shares the single-session guard and cancellation with [`Self::send`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`].
    pub async fn send_turn_based(&self, input: &str) -> Result<SessionOutcome, CoachError> {
        let (id, cancel, request) = self.begin(input)?;

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(self.finalize(id, SessionEnd::Cancelled)),
            reply = self.backend.send(&request) => reply,
        };

        let end = match reply {
            Ok(reply) => {
                self.fill_reply(id, reply);
                SessionEnd::Completed
            }
            Err(e) => SessionEnd::Failed(format!("{e:#}")),
        };

        Ok(self.finalize(id, end))
    }

    fn publish(&self, shared: &Shared) {
        self.snapshot_tx.send_replace(ConversationSnapshot {
            phase: shared.phase,
            turns: shared.conversation.shared_turns(),
            partial: shared.conversation.partial().cloned(),
        });
    }

    /// Claim the session slot and record the user turn
    fn begin(&self, input: &str) -> Result<(SessionId, CancellationToken, ChatRequest), CoachError> {
        let message = input.trim();
        if message.is_empty() {
            return Err(CoachError::EmptyInput);
        }

        let mut shared = self.shared.lock();
        if let Some(ref active) = shared.active {
            tracing::warn!(session = %active.id, "Rejected send while a session is active");
            return Err(CoachError::SessionActive);
        }

        // History is everything before this message
        let history = shared.conversation.history(shared.chat.max_history_turns);
        let request = ChatRequest::new(message)
            .with_history(history)
            .with_format(shared.chat.format_preference)
            .with_auto_tools(shared.chat.auto_tool_selection);

        shared.conversation.push(Turn::user(message));
        shared.conversation.begin_partial();

        let session = ActiveSession::new();
        let id = session.id;
        let cancel = session.cancel.clone();
        shared.active = Some(session);
        shared.phase = SessionPhase::Sending;
        self.publish(&shared);

        tracing::info!(
            session = %id,
            history = request.conversation_history.len(),
            format = %request.format_preference,
            auto_tools = request.auto_tool_selection,
            "Session started"
        );

        Ok((id, cancel, request))
    }

    fn enter_streaming(&self, id: SessionId) -> bool {
        let mut shared = self.shared.lock();
        if shared.live_session(id).is_none() {
            return false;
        }
        shared.phase = SessionPhase::Streaming;
        self.publish(&shared);
        true
    }

    /// Apply one chunk's worth of parsed lines
    fn apply(&self, id: SessionId, bytes: usize, parsed: Vec<ParsedLine>) -> ControlFlow<SessionEnd> {
        let mut shared = self.shared.lock();
        let Shared {
            conversation,
            phase,
            chat,
            active,
            ..
        } = &mut *shared;

        let Some(session) = active
            .as_mut()
            .filter(|s| s.id == id && !s.terminated && !s.cancel.is_cancelled())
        else {
            tracing::debug!(session = %id, "Dropping input for terminated session");
            return ControlFlow::Break(SessionEnd::Cancelled);
        };
        let Some(partial) = conversation.partial_mut() else {
            return ControlFlow::Break(SessionEnd::Cancelled);
        };

        if bytes > 0 {
            session.stats.chunks += 1;
            session.stats.bytes += bytes as u64;
        }

        let mut flow = ControlFlow::Continue(());
        for line in parsed {
            match line {
                ParsedLine::Ignored => {}
                ParsedLine::Malformed { error } => {
                    session.stats.malformed += 1;
                    tracing::warn!(session = %id, error = %error, "Skipping malformed stream record");
                }
                ParsedLine::Unrecognized { kind } => {
                    session.stats.unrecognized += 1;
                    tracing::warn!(session = %id, kind = %kind, "Ignoring unrecognized stream event");
                }
                ParsedLine::Event(event) => {
                    if let ControlFlow::Break(()) =
                        apply_event(session, partial, phase, event, &chat.error_message)
                    {
                        flow = ControlFlow::Break(SessionEnd::Completed);
                        break;
                    }
                }
            }
        }

        self.publish(&shared);
        flow
    }

    fn fill_reply(&self, id: SessionId, reply: ChatReply) {
        let mut shared = self.shared.lock();
        if shared.live_session(id).is_none() {
            return;
        }
        if let Some(partial) = shared.conversation.partial_mut() {
            partial.replace_content(reply.response);
            partial.set_metadata(TurnMetadata {
                action: reply.action,
                tools_used: reply.tools_used,
                reasoning: reply.reasoning,
                format: reply.format,
            });
        }
    }

    /// Settle the session; the only place a session's turn is appended
    fn finalize(&self, id: SessionId, end: SessionEnd) -> SessionOutcome {
        let mut shared = self.shared.lock();

        let mut session = match shared.active.take() {
            Some(session) if session.id == id => session,
            other => {
                shared.active = other;
                tracing::debug!(session = %id, "Session already terminated");
                return SessionOutcome::Cancelled;
            }
        };
        let end = if session.terminated {
            SessionEnd::Cancelled
        } else {
            end
        };

        shared.phase = SessionPhase::Finalizing;
        self.publish(&shared);

        let partial = shared.conversation.take_partial().unwrap_or_default();
        let outcome = match end {
            SessionEnd::Cancelled => SessionOutcome::Cancelled,
            _ if session.errored => partial
                .into_turn(Some(ERROR_ACTION))
                .map_or(SessionOutcome::Empty, SessionOutcome::ServerError),
            SessionEnd::Completed => partial
                .into_turn(None)
                .map_or(SessionOutcome::Empty, SessionOutcome::Completed),
            SessionEnd::Failed(reason) => {
                tracing::warn!(session = %id, error = %reason, "Request failed");
                SessionOutcome::TransportFailed(Turn::assistant(
                    shared.chat.error_message.clone(),
                    TurnMetadata::with_action(ERROR_ACTION),
                ))
            }
        };

        if let Some(turn) = outcome.turn() {
            shared.conversation.push(turn.clone());
        }

        let stats = session.finish_stats();
        shared.last_stats = Some(stats);
        shared.phase = SessionPhase::Idle;
        self.publish(&shared);

        tracing::info!(
            session = %id,
            outcome = outcome_label(&outcome),
            chunks = stats.chunks,
            bytes = stats.bytes,
            events = stats.events,
            malformed = stats.malformed,
            unrecognized = stats.unrecognized,
            elapsed_ms = stats.elapsed_ms,
            "Session finished"
        );

        outcome
    }
}

/// Apply one event; `Break` means the reply is complete
fn apply_event(
    session: &mut ActiveSession,
    partial: &mut PartialTurn,
    phase: &mut SessionPhase,
    event: StreamEvent,
    error_message: &str,
) -> ControlFlow<()> {
    if event.is_terminal() {
        session.stats.events += 1;
        tracing::debug!(session = %session.id, "Received done");
        return ControlFlow::Break(());
    }
    if session.errored {
        tracing::debug!(session = %session.id, kind = event.label(), "Ignoring event after server error");
        return ControlFlow::Continue(());
    }

    session.stats.events += 1;
    match event {
        StreamEvent::Status { kind, text } => {
            tracing::trace!(session = %session.id, kind = kind.as_wire(), "Status");
            partial.set_status(text);
        }
        StreamEvent::ContentDelta(delta) => partial.append(&delta),
        StreamEvent::Metadata(metadata) => {
            tracing::debug!(
                session = %session.id,
                action = ?metadata.action,
                tools = metadata.tools_used.len(),
                "Metadata"
            );
            partial.set_metadata(metadata);
        }
        StreamEvent::Error(message) => {
            let message = message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| error_message.to_string());
            tracing::warn!(session = %session.id, error = %message, "Server reported an error");
            partial.replace_content(message);
            session.errored = true;
            *phase = SessionPhase::Finalizing;
        }
        StreamEvent::Done => {}
    }
    ControlFlow::Continue(())
}

fn outcome_label(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Completed(_) => "completed",
        SessionOutcome::ServerError(_) => "server_error",
        SessionOutcome::TransportFailed(_) => "transport_failed",
        SessionOutcome::Empty => "empty",
        SessionOutcome::Cancelled => "cancelled",
    }
}
