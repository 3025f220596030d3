//! Conversion of a chat transcript into a support ticket.
//!
//! The ticket subsystem owns everything after the handoff; the engine only
//! reads the transcript and records the produced ticket id on the session.

use chatdesk_shared::{ChatMessage, ChatSession};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    ChatEngine,
};

fn ticket_subject(session: &ChatSession) -> String {
    match &session.visitor_name {
        Some(name) => format!("Chat with {}", name),
        None => format!("Chat session {}", session.id),
    }
}

impl ChatEngine {
    /// Hand the session's transcript to the ticket subsystem.
    ///
    /// Idempotent: repeat calls return the ticket id already recorded on the
    /// session. Does not change the session's status.
    pub async fn convert_to_ticket(&self, session_id: Uuid) -> EngineResult<Uuid> {
        let session = self.get_session(session_id).await?;
        if let Some(existing) = session.ticket_id {
            return Ok(existing);
        }

        let transcript = self.transcript(session_id).await?;
        let ticket_id = create_ticket_from_transcript(&self.pool, &session, &transcript).await?;

        // First conversion wins if two agents convert at the same time.
        sqlx::query("UPDATE chat_sessions SET ticket_id = $2 WHERE id = $1 AND ticket_id IS NULL")
            .bind(session_id)
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;

        let recorded: Option<Uuid> =
            sqlx::query_scalar("SELECT ticket_id FROM chat_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        let ticket_id = recorded.unwrap_or(ticket_id);

        tracing::info!(
            session_id = %session_id,
            ticket_id = %ticket_id,
            "Chat session converted to ticket"
        );

        Ok(ticket_id)
    }
}

/// Ticket subsystem handoff: snapshot the transcript into a ticket row.
async fn create_ticket_from_transcript(
    pool: &PgPool,
    session: &ChatSession,
    messages: &[ChatMessage],
) -> EngineResult<Uuid> {
    let transcript =
        serde_json::to_value(messages).map_err(|e| EngineError::Transient(e.to_string()))?;

    let ticket_id: Uuid = sqlx::query_scalar(
        "INSERT INTO chat_tickets (session_id, subject, transcript) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(session.id)
    .bind(ticket_subject(session))
    .bind(&transcript)
    .fetch_one(pool)
    .await?;

    Ok(ticket_id)
}
