//! Session lifecycle operations
//!
//! State machine: `Pending -> Active -> Closed`, `Pending -> Declined`.
//! Accept is the one place true race protection is mandatory: the transition
//! is a single conditional UPDATE keyed on `status = 'pending'`, so two
//! racing agents can never both win.

use chatdesk_shared::{ChatSession, Sender, SessionStatus};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    events::ChatEvent,
    messages::{self, NewMessage},
    ChatEngine,
};

const SESSION_COLUMNS: &str = "id, visitor_id, visitor_name, visitor_email, visitor_ip, \
     agent_id, status, last_message_seq, ticket_id, close_notes, \
     created_at, last_activity_at, closed_at";

/// Visitor-supplied profile captured at session start.
#[derive(Debug, Clone, Default)]
pub struct VisitorProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub ip: Option<String>,
}

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 320;

fn validate_profile(profile: &VisitorProfile) -> EngineResult<()> {
    if let Some(name) = &profile.name {
        if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::InvalidInput(format!(
                "visitor name must be 1-{} characters",
                MAX_NAME_LEN
            )));
        }
    }
    if let Some(email) = &profile.email {
        if !email.contains('@') || email.len() > MAX_EMAIL_LEN {
            return Err(EngineError::InvalidInput(
                "visitor email is malformed".to_string(),
            ));
        }
    }
    Ok(())
}

impl ChatEngine {
    /// Start a chat session in `Pending`.
    ///
    /// Idempotent for identified visitors: if the visitor already holds a
    /// non-terminal session, that session is returned instead of creating a
    /// duplicate. Anonymous starts always create a fresh session.
    pub async fn start_session(
        &self,
        visitor_id: Option<Uuid>,
        profile: VisitorProfile,
    ) -> EngineResult<ChatSession> {
        validate_profile(&profile)?;

        if let Some(vid) = visitor_id {
            if let Some(existing) = self.live_session_for_visitor(vid).await? {
                tracing::debug!(
                    session_id = %existing.id,
                    visitor_id = %vid,
                    "Visitor already holds a live session"
                );
                return Ok(existing);
            }
        }

        let insert = sqlx::query_as::<_, ChatSession>(&format!(
            r#"
            INSERT INTO chat_sessions (visitor_id, visitor_name, visitor_email, visitor_ip)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(visitor_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.ip)
        .fetch_one(&self.pool)
        .await;

        let session = match insert {
            Ok(session) => session,
            // Unique violation on the live-visitor index: a concurrent start
            // for the same visitor won. Return theirs.
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                let Some(vid) = visitor_id else {
                    return Err(EngineError::Transient(db_err.to_string()));
                };
                return self
                    .live_session_for_visitor(vid)
                    .await?
                    .ok_or_else(|| EngineError::Transient("start session race".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            session_id = %session.id,
            visitor_id = ?visitor_id,
            "Chat session created, waiting for an agent"
        );

        self.events.send(ChatEvent::SessionPending {
            session: session.clone(),
        });

        Ok(session)
    }

    /// Accept a pending session. Atomic and exclusive: exactly one of any
    /// number of concurrent acceptors wins; the rest get `AlreadyAccepted`.
    ///
    /// The status transition and the "Agent has joined" system message commit
    /// in the same transaction.
    pub async fn accept_session(
        &self,
        session_id: Uuid,
        agent_id: Uuid,
    ) -> EngineResult<ChatSession> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<ChatSession> = sqlx::query_as(&format!(
            r#"
            UPDATE chat_sessions
            SET status = 'active', agent_id = $2, last_activity_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(agent_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut session) = updated else {
            drop(tx);
            let status: Option<SessionStatus> =
                sqlx::query_scalar("SELECT status FROM chat_sessions WHERE id = $1")
                    .bind(session_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match status {
                None => EngineError::NotFound,
                Some(SessionStatus::Active) => EngineError::AlreadyAccepted,
                Some(status) => EngineError::InvalidState(status),
            });
        };

        let joined = messages::append_in_tx(
            &mut tx,
            session_id,
            Sender::System,
            NewMessage::text("Agent has joined the chat"),
            self.config.max_message_len,
        )
        .await?;
        session.last_message_seq = joined.seq;

        tx.commit().await?;

        tracing::info!(
            session_id = %session_id,
            agent_id = %agent_id,
            "Chat session accepted"
        );

        self.events.send(ChatEvent::SessionAccepted {
            session: session.clone(),
        });

        Ok(session)
    }

    /// Decline a pending session. Terminal; the visitor is notified through
    /// the declined event.
    pub async fn decline_session(
        &self,
        session_id: Uuid,
        reason: Option<String>,
    ) -> EngineResult<ChatSession> {
        let updated: Option<ChatSession> = sqlx::query_as(&format!(
            r#"
            UPDATE chat_sessions
            SET status = 'declined', close_notes = $2, last_activity_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(&reason)
        .fetch_optional(&self.pool)
        .await?;

        let Some(session) = updated else {
            let status: Option<SessionStatus> =
                sqlx::query_scalar("SELECT status FROM chat_sessions WHERE id = $1")
                    .bind(session_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match status {
                None => EngineError::NotFound,
                Some(status) => EngineError::InvalidState(status),
            });
        };

        tracing::info!(session_id = %session_id, reason = ?reason, "Chat session declined");

        self.events.send(ChatEvent::SessionDeclined {
            session: session.clone(),
            reason,
        });

        Ok(session)
    }

    /// Close an active session, stamping `closed_at` and appending the
    /// "session ended" system message in one transaction.
    ///
    /// Closing an already-closed session is an idempotent no-op that returns
    /// the session unchanged.
    pub async fn close_session(
        &self,
        session_id: Uuid,
        notes: Option<String>,
    ) -> EngineResult<ChatSession> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<ChatSession> = sqlx::query_as(&format!(
            r#"
            UPDATE chat_sessions
            SET status = 'closed', closed_at = NOW(),
                close_notes = COALESCE($2, close_notes),
                last_activity_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(&notes)
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(mut session) => {
                let ended = messages::append_in_tx(
                    &mut tx,
                    session_id,
                    Sender::System,
                    NewMessage::text("Chat session ended"),
                    self.config.max_message_len,
                )
                .await?;
                session.last_message_seq = ended.seq;

                tx.commit().await?;

                tracing::info!(session_id = %session_id, "Chat session closed");
                Ok(session)
            }
            None => {
                drop(tx);
                let session = self.get_session(session_id).await?;
                match session.status {
                    // Repeat close: no-op, closed_at untouched.
                    SessionStatus::Closed => Ok(session),
                    status => Err(EngineError::InvalidState(status)),
                }
            }
        }
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, session_id: Uuid) -> EngineResult<ChatSession> {
        sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(EngineError::NotFound)
    }

    /// List sessions, optionally filtered by status. Oldest first, so the
    /// pending queue surfaces the longest-waiting visitor on top.
    pub async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> EngineResult<Vec<ChatSession>> {
        let limit = limit.clamp(1, 100);
        let sessions = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE ($1::chat_session_status IS NULL OR status = $1)
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// Pending sessions that have waited longer than the given window.
    /// Consumed by the auto-decline sweep.
    pub async fn stale_pending_sessions(&self, older_than: Duration) -> EngineResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM chat_sessions
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(secs => $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(older_than.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Active sessions with no activity inside the given window.
    /// Consumed by the idle-close sweep.
    pub async fn idle_active_sessions(&self, idle_for: Duration) -> EngineResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM chat_sessions
            WHERE status = 'active'
              AND last_activity_at < NOW() - make_interval(secs => $1)
            ORDER BY last_activity_at ASC
            "#,
        )
        .bind(idle_for.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn live_session_for_visitor(
        &self,
        visitor_id: Uuid,
    ) -> EngineResult<Option<ChatSession>> {
        let session = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM chat_sessions
            WHERE visitor_id = $1 AND status IN ('pending', 'active')
            LIMIT 1
            "#
        ))
        .bind(visitor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }
}
