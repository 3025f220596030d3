//! Visitor-facing chat routes
//!
//! The widget calls these. A session-scoped token is minted at start and
//! must accompany every later call for that session.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chatdesk_engine::{Cursor, NewMessage, PollResponse, VisitorProfile};
use chatdesk_shared::{AttachmentRef, ChatMessage, ChatSession, Party, Sender};

use crate::{
    auth::{require_any_token, require_session_owner},
    error::{ApiError, ApiResult},
    routes::extract_client_ip,
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub visitor_id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session: ChatSession,
    /// Session-scoped bearer token for all follow-up calls.
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    pub reply_to: Option<i64>,
    /// Reference to an attachment previously uploaded via `/chat/attachments`.
    pub attachment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// Cursor: deliver messages with id greater than this.
    pub since: Option<i64>,
    /// Without a cursor: `history=true` returns the full transcript,
    /// otherwise only the latest message is returned as a context hint.
    pub history: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub agents_online: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn parse_cursor(query: &PollQuery) -> Result<Cursor, ApiError> {
    match (query.since, query.history.unwrap_or(false)) {
        (Some(since), _) if since < 0 => Err(ApiError::BadRequest(
            "since must be non-negative".to_string(),
        )),
        (Some(since), _) => Ok(Cursor::After(since)),
        (None, true) => Ok(Cursor::Start),
        (None, false) => Ok(Cursor::TailHint),
    }
}

pub(crate) async fn resolve_attachment(
    state: &AppState,
    attachment_id: Option<Uuid>,
) -> ApiResult<Option<AttachmentRef>> {
    match attachment_id {
        Some(id) => Ok(Some(state.engine.attachment_ref(id).await?)),
        None => Ok(None),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Start a chat session (or resume the visitor's live one)
pub async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    let profile = VisitorProfile {
        name: req.name,
        email: req.email,
        ip: extract_client_ip(&headers),
    };

    let session = state.engine.start_session(req.visitor_id, profile).await?;
    let token = state.auth.tokens.issue_visitor_token(session.id)?;

    Ok(Json(StartSessionResponse { session, token }))
}

/// Whether any agent is currently online, for the pre-chat widget
pub async fn availability(State(state): State<AppState>) -> Json<AvailabilityResponse> {
    Json(AvailabilityResponse {
        agents_online: state.engine.typing().any_agent_online().await,
    })
}

/// Send a message as the visitor
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatMessage>> {
    require_session_owner(&state.auth, &headers, session_id)?;

    let attachment = resolve_attachment(&state, req.attachment_id).await?;
    let message = state
        .engine
        .append(
            session_id,
            Sender::Visitor,
            NewMessage {
                body: req.body,
                reply_to: req.reply_to,
                attachment,
            },
        )
        .await?;

    Ok(Json(message))
}

/// Poll for new messages, typing state, and session status
pub async fn poll(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<PollQuery>,
) -> ApiResult<Json<PollResponse>> {
    require_session_owner(&state.auth, &headers, session_id)?;

    let cursor = parse_cursor(&query)?;
    let response = state.engine.poll(session_id, cursor).await?;
    Ok(Json(response))
}

/// Set or clear the visitor typing flag
pub async fn set_typing(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<TypingRequest>,
) -> ApiResult<StatusCode> {
    require_session_owner(&state.auth, &headers, session_id)?;

    state
        .engine
        .typing()
        .set_typing(session_id, Party::Visitor, req.is_typing)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark agent messages as read by the visitor
pub async fn mark_read(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<MarkReadResponse>> {
    require_session_owner(&state.auth, &headers, session_id)?;

    let marked = state.engine.mark_read(session_id, Party::Visitor).await?;
    Ok(Json(MarkReadResponse { marked }))
}

/// Close the session from the visitor side
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<CloseSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    require_session_owner(&state.auth, &headers, session_id)?;

    let session = state.engine.close_session(session_id, req.notes).await?;
    Ok(Json(session))
}

/// Upload an attachment; the returned reference is embedded in a later
/// message. Either party may upload.
pub async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<Json<AttachmentRef>> {
    require_any_token(&state.auth, &headers)?;

    let mime = headers
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let attachment = state
        .engine
        .store_attachment(&query.filename, &mime, body.len() as i64)
        .await?;
    Ok(Json(attachment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cursor_since_wins() {
        let query = PollQuery {
            since: Some(5),
            history: Some(true),
        };
        assert_eq!(parse_cursor(&query).unwrap(), Cursor::After(5));
    }

    #[test]
    fn test_parse_cursor_full_history() {
        let query = PollQuery {
            since: None,
            history: Some(true),
        };
        assert_eq!(parse_cursor(&query).unwrap(), Cursor::Start);
    }

    #[test]
    fn test_parse_cursor_bare_poll_is_tail_hint() {
        let query = PollQuery {
            since: None,
            history: None,
        };
        assert_eq!(parse_cursor(&query).unwrap(), Cursor::TailHint);
    }

    #[test]
    fn test_parse_cursor_rejects_negative() {
        let query = PollQuery {
            since: Some(-1),
            history: None,
        };
        assert!(parse_cursor(&query).is_err());
    }

    #[test]
    fn test_parse_cursor_zero_is_valid_seed() {
        let query = PollQuery {
            since: Some(0),
            history: None,
        };
        assert_eq!(parse_cursor(&query).unwrap(), Cursor::After(0));
    }
}
