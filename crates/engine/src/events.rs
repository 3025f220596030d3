//! Lifecycle and message events emitted for the Notifier.
//!
//! Events travel over an unbounded channel so notification side effects
//! (email, push) can never fail or slow down an engine operation. Dropping
//! the receiver silently disables notifications.

use chatdesk_shared::{ChatMessage, ChatSession};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events a Notifier implementation reacts to.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A visitor started a session and is waiting for an agent.
    SessionPending { session: ChatSession },
    /// An agent accepted a pending session.
    SessionAccepted { session: ChatSession },
    /// A pending session was declined (by an agent or the auto-decline sweep).
    SessionDeclined {
        session: ChatSession,
        reason: Option<String>,
    },
    /// A message was appended to a session's transcript.
    MessageAppended { session_id: Uuid, message: ChatMessage },
}

/// Cloneable handle the engine publishes events through.
#[derive(Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl EventSender {
    /// Create a sender plus the receiver a notifier task consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sender that discards every event. Used by the worker and in tests.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: ChatEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("Notifier receiver dropped; event discarded");
            }
        }
    }
}
