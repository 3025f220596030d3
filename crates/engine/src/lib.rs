//! ChatDesk Session/Message Engine
//!
//! The core of the live-chat broker: session lifecycle, the per-session
//! ordered message log, typing signals, and the poll delta protocol.
//! Everything else in the platform (HTTP binding, notifier, sweeps) is a
//! caller of this crate.

pub mod attachments;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod poll;
pub mod sessions;
pub mod tickets;
pub mod typing;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{ChatEvent, EventSender};
pub use messages::{Cursor, NewMessage};
pub use poll::PollResponse;
pub use sessions::VisitorProfile;
pub use typing::TypingStore;

use sqlx::PgPool;

/// The session/message engine. Cheap to clone; shared across handlers.
///
/// All mutation goes through this struct: only the engine transitions
/// `chat_sessions.status`, and only the message log path writes
/// `chat_messages` rows.
#[derive(Clone)]
pub struct ChatEngine {
    pool: PgPool,
    typing: TypingStore,
    events: EventSender,
    config: EngineConfig,
}

impl ChatEngine {
    pub fn new(pool: PgPool, typing: TypingStore, events: EventSender, config: EngineConfig) -> Self {
        Self {
            pool,
            typing,
            events,
            config,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn typing(&self) -> &TypingStore {
        &self.typing
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
