//! Agent-facing chat routes
//!
//! All routes here sit behind the `require_agent` middleware, which verifies
//! the agent capability and injects the agent identity.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chatdesk_engine::{Cursor, NewMessage, PollResponse};
use chatdesk_shared::{ChatMessage, ChatSession, Party, Sender, SessionStatus};

use crate::{
    auth::AgentIdentity,
    error::{ApiError, ApiResult},
    routes::chat::{parse_cursor, resolve_attachment, PollQuery, SendMessageRequest},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SessionsListResponse {
    pub sessions: Vec<ChatSession>,
}

#[derive(Debug, Deserialize)]
pub struct DeclineSessionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub ticket_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub since: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List sessions for the agent dashboard. `status=pending` is the queue,
/// oldest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<SessionsListResponse>> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<SessionStatus>()
                .map_err(ApiError::BadRequest)?,
        ),
        None => None,
    };

    let sessions = state
        .engine
        .list_sessions(status, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(SessionsListResponse { sessions }))
}

/// Accept a pending session. Exactly one agent wins a race; the others
/// receive ALREADY_ACCEPTED and should refresh their queue.
pub async fn accept_session(
    State(state): State<AppState>,
    Extension(agent): Extension<AgentIdentity>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ChatSession>> {
    let session = state
        .engine
        .accept_session(session_id, agent.agent_id)
        .await?;
    Ok(Json(session))
}

/// Decline a pending session
pub async fn decline_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<DeclineSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    let session = state.engine.decline_session(session_id, req.reason).await?;
    Ok(Json(session))
}

/// Close an active session with wrap-up notes
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CloseSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    let session = state.engine.close_session(session_id, req.notes).await?;
    Ok(Json(session))
}

/// Send a message as the agent
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatMessage>> {
    let attachment = resolve_attachment(&state, req.attachment_id).await?;
    let message = state
        .engine
        .append(
            session_id,
            Sender::Agent,
            NewMessage {
                body: req.body,
                reply_to: req.reply_to,
                attachment,
            },
        )
        .await?;
    Ok(Json(message))
}

/// Read the transcript from a cursor (full history without one)
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let cursor = match query.since {
        Some(since) if since < 0 => {
            return Err(ApiError::BadRequest("since must be non-negative".to_string()))
        }
        Some(since) => Cursor::After(since),
        None => Cursor::Start,
    };
    let messages = state.engine.list_since(session_id, cursor).await?;
    Ok(Json(messages))
}

/// Poll for the agent console
pub async fn poll(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
) -> ApiResult<Json<PollResponse>> {
    let cursor = parse_cursor(&query)?;
    let response = state.engine.poll(session_id, cursor).await?;
    Ok(Json(response))
}

/// Set or clear the agent typing flag
pub async fn set_typing(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<TypingRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .typing()
        .set_typing(session_id, Party::Agent, req.is_typing)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark visitor messages as read by the agent
pub async fn mark_read(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<MarkReadResponse>> {
    let marked = state.engine.mark_read(session_id, Party::Agent).await?;
    Ok(Json(MarkReadResponse { marked }))
}

/// Convert the session transcript into a support ticket
pub async fn convert_to_ticket(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ConvertResponse>> {
    let ticket_id = state.engine.convert_to_ticket(session_id).await?;
    Ok(Json(ConvertResponse { ticket_id }))
}

/// Presence heartbeat; keeps the agent (and the coarse availability flag)
/// marked online for the presence TTL.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(agent): Extension<AgentIdentity>,
) -> ApiResult<StatusCode> {
    state.engine.typing().heartbeat_agent(agent.agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
