//! Poll Coordinator
//!
//! Computes the delta a client should see since its last known cursor. Each
//! call returns immediately with whatever is currently known; the real-time
//! feel comes entirely from client poll frequency.

use chatdesk_shared::{ChatMessage, SessionStatus, TypingState};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{error::EngineResult, messages::Cursor, ChatEngine};

/// Everything a polling client needs to catch up.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub has_updates: bool,
    pub new_messages: Vec<ChatMessage>,
    pub typing: TypingState,
    pub session_status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    /// Cursor for the next poll. Feeding this back as `since` guarantees no
    /// message is missed and none is delivered twice.
    pub latest_message_id: i64,
}

/// The cursor a client should present next: the last message delivered, or
/// where it already was when nothing new arrived.
fn next_cursor(messages: &[ChatMessage], cursor: Cursor, session_tail: i64) -> i64 {
    match messages.last() {
        Some(last) => last.seq,
        None => match cursor {
            Cursor::After(seq) => seq,
            Cursor::Start | Cursor::TailHint => session_tail,
        },
    }
}

impl ChatEngine {
    /// Compute the delta since `cursor` for one session.
    pub async fn poll(&self, session_id: Uuid, cursor: Cursor) -> EngineResult<PollResponse> {
        let session = self.get_session(session_id).await?;
        let new_messages = self.fetch_since(session_id, cursor).await?;
        let typing = self.typing.typing_state(session_id).await;

        let latest_message_id = next_cursor(&new_messages, cursor, session.last_message_seq);
        let has_updates = !new_messages.is_empty() || typing.visitor || typing.agent;

        Ok(PollResponse {
            has_updates,
            new_messages,
            typing,
            session_status: session.status,
            last_activity_at: session.last_activity_at,
            latest_message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_shared::Sender;

    fn msg(seq: i64) -> ChatMessage {
        ChatMessage {
            session_id: Uuid::new_v4(),
            seq,
            sender: Sender::Visitor,
            body: "hi".to_string(),
            reply_to: None,
            attachment: None,
            read_by_visitor: false,
            read_by_agent: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_next_cursor_advances_to_last_delivered() {
        let messages = vec![msg(3), msg(4), msg(5)];
        assert_eq!(next_cursor(&messages, Cursor::After(2), 5), 5);
        assert_eq!(next_cursor(&messages, Cursor::Start, 5), 5);
    }

    #[test]
    fn test_next_cursor_holds_position_when_empty() {
        assert_eq!(next_cursor(&[], Cursor::After(7), 7), 7);
    }

    #[test]
    fn test_next_cursor_empty_history_starts_at_zero() {
        assert_eq!(next_cursor(&[], Cursor::Start, 0), 0);
        assert_eq!(next_cursor(&[], Cursor::TailHint, 0), 0);
    }

    #[test]
    fn test_next_cursor_tail_hint_lands_on_latest() {
        let messages = vec![msg(9)];
        assert_eq!(next_cursor(&messages, Cursor::TailHint, 9), 9);
    }
}
