//! Incremental terminal rendering of conversation snapshots
//!
//! Snapshots carry the whole partial reply; the renderer remembers what it
//! already printed and only emits the difference.

use coach_core::{ConversationSnapshot, SessionOutcome};

/// One thing to write to the terminal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Render {
    /// Server activity line
    Status(String),
    /// Text continuing the reply on screen
    Append(String),
    /// Reply text that does not continue what is on screen
    Restart(String),
    /// Closing note (cancelled, nothing received)
    Note(String),
}

/// Tracks what part of the in-flight reply is already on screen
#[derive(Debug, Default)]
pub struct StreamRenderer {
    shown: String,
    status: String,
}

impl StreamRenderer {
    /// Renderer for a fresh reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Output needed to bring the screen up to `snapshot`
    pub fn observe(&mut self, snapshot: &ConversationSnapshot) -> Vec<Render> {
        let mut out = Vec::new();
        let Some(partial) = snapshot.partial.as_ref() else {
            return out;
        };

        if !partial.status.is_empty() && partial.status != self.status {
            self.status.clone_from(&partial.status);
            out.push(Render::Status(partial.status.clone()));
        }
        self.show(&partial.content, &mut out);
        out
    }

    /// Output for the settled session
    pub fn finish(&mut self, outcome: &SessionOutcome) -> Vec<Render> {
        let mut out = Vec::new();
        match outcome {
            SessionOutcome::Completed(turn)
            | SessionOutcome::ServerError(turn)
            | SessionOutcome::TransportFailed(turn) => self.show(&turn.content, &mut out),
            SessionOutcome::Empty => out.push(Render::Note("(no reply)".to_string())),
            SessionOutcome::Cancelled => out.push(Render::Note("(cancelled)".to_string())),
        }
        self.shown.clear();
        self.status.clear();
        out
    }

    fn show(&mut self, content: &str, out: &mut Vec<Render>) {
        if content == self.shown {
            return;
        }
        match content.strip_prefix(self.shown.as_str()) {
            Some(rest) => out.push(Render::Append(rest.to_string())),
            None => out.push(Render::Restart(content.to_string())),
        }
        self.shown = content.to_string();
    }
}
