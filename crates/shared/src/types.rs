//! Core domain types for the live-chat engine.
//!
//! A `ChatSession` is one visitor-to-agent conversation; `ChatMessage` rows
//! form its append-only, per-session-ordered transcript.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a chat session.
///
/// Transitions: `Pending -> Active -> Closed`, and `Pending -> Declined`.
/// `Declined` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "chat_session_status", rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Declined,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Declined => "declined",
            SessionStatus::Closed => "closed",
        }
    }

    /// Declined and Closed sessions accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Declined | SessionStatus::Closed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "active" => Ok(SessionStatus::Active),
            "declined" => Ok(SessionStatus::Declined),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "chat_sender", rename_all = "lowercase")]
pub enum Sender {
    Visitor,
    Agent,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Visitor => "visitor",
            Sender::Agent => "agent",
            Sender::System => "system",
        }
    }
}

/// One of the two human parties in a session. Used for typing signals and
/// read-state, where `System` has no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Visitor,
    Agent,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Visitor => "visitor",
            Party::Agent => "agent",
        }
    }

    pub fn other(&self) -> Party {
        match self {
            Party::Visitor => Party::Agent,
            Party::Agent => Party::Visitor,
        }
    }

    pub fn sender(&self) -> Sender {
        match self {
            Party::Visitor => Sender::Visitor,
            Party::Agent => Sender::Agent,
        }
    }
}

/// A chat session row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub visitor_id: Option<Uuid>,
    pub visitor_name: Option<String>,
    pub visitor_email: Option<String>,
    pub visitor_ip: Option<String>,
    pub agent_id: Option<Uuid>,
    pub status: SessionStatus,
    /// Highest message seq assigned so far (0 = no messages yet).
    pub last_message_seq: i64,
    pub ticket_id: Option<Uuid>,
    pub close_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
}

/// Opaque reference to an attachment held by the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
    pub size: i64,
    pub mime: String,
}

/// A single message in a session's transcript.
///
/// `seq` is assigned by the message log at append time and is strictly
/// increasing and gap-free within the session.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub session_id: Uuid,
    pub seq: i64,
    pub sender: Sender,
    pub body: String,
    pub reply_to: Option<i64>,
    pub attachment: Option<AttachmentRef>,
    pub read_by_visitor: bool,
    pub read_by_agent: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Live typing flags for both parties, as read from the TTL store.
/// An absent or expired entry reads as `false`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TypingState {
    pub visitor: bool,
    pub agent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Active,
            SessionStatus::Declined,
            SessionStatus::Closed,
        ] {
            let parsed: SessionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("resolved".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Declined.is_terminal());
        assert!(SessionStatus::Closed.is_terminal());
    }

    #[test]
    fn test_party_other() {
        assert_eq!(Party::Visitor.other(), Party::Agent);
        assert_eq!(Party::Agent.other(), Party::Visitor);
        assert_eq!(Party::Agent.sender(), Sender::Agent);
    }

    #[test]
    fn test_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
