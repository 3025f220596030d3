//! Append-only message log
//!
//! Message ids (`seq`) are assigned by bumping `last_message_seq` on the
//! session row inside the append transaction. The row lock serializes
//! concurrent appends, so ids are strictly increasing and gap-free without
//! any read-modify-write of a materialized list.

use chatdesk_shared::{AttachmentRef, ChatMessage, Party, Sender, SessionStatus};
use sqlx::{FromRow, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    events::ChatEvent,
    ChatEngine,
};

const MESSAGE_COLUMNS: &str = "session_id, seq, sender, body, reply_to_seq, \
     attachment_id, attachment_url, attachment_name, attachment_size, attachment_mime, \
     read_by_visitor, read_by_agent, created_at";

/// Where to start reading a session's transcript.
///
/// The cursorless fallback is explicit by design: callers choose between the
/// full history and the latest-message context hint instead of the engine
/// inferring intent from a missing parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Full history from the first message.
    Start,
    /// Messages with id strictly greater than the given one, ascending.
    After(i64),
    /// Only the most recent message, as a context hint for clients that have
    /// not seen any of the transcript yet.
    TailHint,
}

/// A message to append, before the log assigns its id.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub body: String,
    pub reply_to: Option<i64>,
    pub attachment: Option<AttachmentRef>,
}

impl NewMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    session_id: Uuid,
    seq: i64,
    sender: Sender,
    body: String,
    reply_to_seq: Option<i64>,
    attachment_id: Option<Uuid>,
    attachment_url: Option<String>,
    attachment_name: Option<String>,
    attachment_size: Option<i64>,
    attachment_mime: Option<String>,
    read_by_visitor: bool,
    read_by_agent: bool,
    created_at: OffsetDateTime,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        let attachment = match (
            row.attachment_id,
            row.attachment_url,
            row.attachment_name,
            row.attachment_size,
            row.attachment_mime,
        ) {
            (Some(id), Some(url), Some(filename), Some(size), Some(mime)) => Some(AttachmentRef {
                id,
                url,
                filename,
                size,
                mime,
            }),
            _ => None,
        };

        ChatMessage {
            session_id: row.session_id,
            seq: row.seq,
            sender: row.sender,
            body: row.body,
            reply_to: row.reply_to_seq,
            attachment,
            read_by_visitor: row.read_by_visitor,
            read_by_agent: row.read_by_agent,
            created_at: row.created_at,
        }
    }
}

pub(crate) fn validate_body(body: &str, max_len: usize) -> EngineResult<()> {
    if body.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "message body cannot be empty".to_string(),
        ));
    }
    if body.len() > max_len {
        return Err(EngineError::TooLong(max_len));
    }
    Ok(())
}

impl ChatEngine {
    /// Append a message to an active session and return it with its assigned
    /// id. Visitor/Agent appends require the session to be `Active`; System
    /// messages are appended by the engine itself during transitions.
    pub async fn append(
        &self,
        session_id: Uuid,
        sender: Sender,
        message: NewMessage,
    ) -> EngineResult<ChatMessage> {
        validate_body(&message.body, self.config.max_message_len)?;

        let mut tx = self.pool.begin().await?;
        let stored = append_in_tx(
            &mut tx,
            session_id,
            sender,
            message,
            self.config.max_message_len,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(
            session_id = %session_id,
            seq = stored.seq,
            sender = sender.as_str(),
            "Message appended"
        );

        self.events.send(ChatEvent::MessageAppended {
            session_id,
            message: stored.clone(),
        });

        Ok(stored)
    }

    /// Mark all unread messages authored by the other party as read.
    /// Bulk and idempotent; returns the number of rows marked.
    pub async fn mark_read(&self, session_id: Uuid, reader: Party) -> EngineResult<u64> {
        // Existence check so an unknown session reports NotFound, not 0.
        self.get_session(session_id).await?;

        let result = match reader {
            Party::Visitor => {
                sqlx::query(
                    r#"
                    UPDATE chat_messages
                    SET read_by_visitor = TRUE
                    WHERE session_id = $1 AND read_by_visitor = FALSE AND sender = 'agent'
                    "#,
                )
                .bind(session_id)
                .execute(&self.pool)
                .await?
            }
            Party::Agent => {
                sqlx::query(
                    r#"
                    UPDATE chat_messages
                    SET read_by_agent = TRUE
                    WHERE session_id = $1 AND read_by_agent = FALSE AND sender = 'visitor'
                    "#,
                )
                .bind(session_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    /// Read messages from the given cursor. `NotFound` for unknown sessions.
    pub async fn list_since(
        &self,
        session_id: Uuid,
        cursor: Cursor,
    ) -> EngineResult<Vec<ChatMessage>> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chat_sessions WHERE id = $1)")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Err(EngineError::NotFound);
        }
        self.fetch_since(session_id, cursor).await
    }

    /// The full transcript, oldest first.
    pub async fn transcript(&self, session_id: Uuid) -> EngineResult<Vec<ChatMessage>> {
        self.list_since(session_id, Cursor::Start).await
    }

    /// Cursor read without the session existence check; poll already holds
    /// the session row.
    pub(crate) async fn fetch_since(
        &self,
        session_id: Uuid,
        cursor: Cursor,
    ) -> EngineResult<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = match cursor {
            Cursor::Start => {
                sqlx::query_as(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM chat_messages
                    WHERE session_id = $1
                    ORDER BY seq ASC
                    "#
                ))
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?
            }
            Cursor::After(seq) => {
                sqlx::query_as(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM chat_messages
                    WHERE session_id = $1 AND seq > $2
                    ORDER BY seq ASC
                    "#
                ))
                .bind(session_id)
                .bind(seq)
                .fetch_all(&self.pool)
                .await?
            }
            Cursor::TailHint => {
                sqlx::query_as(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM chat_messages
                    WHERE session_id = $1
                    ORDER BY seq DESC
                    LIMIT 1
                    "#
                ))
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Append inside an existing transaction. Used directly by the session
/// engine so a status transition and its system message commit atomically.
pub(crate) async fn append_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
    sender: Sender,
    message: NewMessage,
    max_len: usize,
) -> EngineResult<ChatMessage> {
    validate_body(&message.body, max_len)?;

    // Bump the per-session counter; the session row lock serializes this.
    let bumped: Option<(i64, SessionStatus)> = sqlx::query_as(
        r#"
        UPDATE chat_sessions
        SET last_message_seq = last_message_seq + 1, last_activity_at = NOW()
        WHERE id = $1
        RETURNING last_message_seq, status
        "#,
    )
    .bind(session_id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some((seq, status)) = bumped else {
        return Err(EngineError::NotFound);
    };

    if sender != Sender::System && status != SessionStatus::Active {
        return Err(EngineError::InvalidState(status));
    }

    if let Some(reply_to) = message.reply_to {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chat_messages WHERE session_id = $1 AND seq = $2)",
        )
        .bind(session_id)
        .bind(reply_to)
        .fetch_one(&mut **tx)
        .await?;
        if !exists {
            return Err(EngineError::InvalidInput(format!(
                "reply_to references unknown message {}",
                reply_to
            )));
        }
    }

    let attachment = message.attachment.as_ref();
    let stored: MessageRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO chat_messages (
            session_id, seq, sender, body, reply_to_seq,
            attachment_id, attachment_url, attachment_name, attachment_size, attachment_mime
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(seq)
    .bind(sender)
    .bind(&message.body)
    .bind(message.reply_to)
    .bind(attachment.map(|a| a.id))
    .bind(attachment.map(|a| a.url.as_str()))
    .bind(attachment.map(|a| a.filename.as_str()))
    .bind(attachment.map(|a| a.size))
    .bind(attachment.map(|a| a.mime.as_str()))
    .fetch_one(&mut **tx)
    .await?;

    Ok(stored.into())
}
