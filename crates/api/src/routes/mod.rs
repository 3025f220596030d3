//! API routes

pub mod agent;
pub mod chat;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderMap,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::require_agent, state::AppState};

/// Extract client IP address from request headers.
/// Checks common proxy headers in order of preference.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-connecting-ip") // Cloudflare
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Visitor surface. Starting a session is open; every other route checks
    // the session-scoped visitor token inside the handler.
    let visitor_routes = Router::new()
        .route("/chat/sessions", post(chat::start_session))
        .route("/chat/availability", get(chat::availability))
        .route("/chat/attachments", post(chat::upload_attachment))
        .route("/chat/sessions/:session_id/messages", post(chat::send_message))
        .route("/chat/sessions/:session_id/poll", get(chat::poll))
        .route("/chat/sessions/:session_id/typing", post(chat::set_typing))
        .route("/chat/sessions/:session_id/read", post(chat::mark_read))
        .route("/chat/sessions/:session_id/close", post(chat::close_session));

    // Agent surface, behind the agent capability check.
    let agent_routes = Router::new()
        .route("/agent/chat/sessions", get(agent::list_sessions))
        .route("/agent/chat/sessions/:session_id/accept", post(agent::accept_session))
        .route("/agent/chat/sessions/:session_id/decline", post(agent::decline_session))
        .route("/agent/chat/sessions/:session_id/close", post(agent::close_session))
        .route(
            "/agent/chat/sessions/:session_id/messages",
            get(agent::list_messages).post(agent::send_message),
        )
        .route("/agent/chat/sessions/:session_id/poll", get(agent::poll))
        .route("/agent/chat/sessions/:session_id/typing", post(agent::set_typing))
        .route("/agent/chat/sessions/:session_id/read", post(agent::mark_read))
        .route("/agent/chat/sessions/:session_id/convert", post(agent::convert_to_ticket))
        .route("/agent/presence", post(agent::heartbeat))
        .layer(middleware::from_fn_with_state(auth_state, require_agent));

    let api_v1_routes = Router::new().merge(visitor_routes).merge(agent_routes);

    // Attachment uploads are the largest accepted payload; everything else
    // is far below this.
    let body_limit = (state.config.chat_max_attachment_bytes as usize).saturating_add(64 * 1024);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        // The widget is embedded on customer sites; origins are not known
        // ahead of time.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
