//! Health check endpoints
//!
//! The chat broker needs both Postgres (sessions, messages) and the Redis
//! TTL store (typing, presence) to serve traffic; readiness reflects both.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub ttl_store: String,
}

fn label(healthy: bool) -> String {
    if healthy { "healthy" } else { "unhealthy" }.to_string()
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let ttl_ok = state.engine.typing().ping().await.is_ok();

    let overall = if db_ok && ttl_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        overall,
        Json(HealthResponse {
            status: label(overall == StatusCode::OK),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: label(db_ok),
            ttl_store: label(ttl_ok),
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe (checks if the service is ready to accept traffic)
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let ttl_ok = state.engine.typing().ping().await.is_ok();
    if db_ok && ttl_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
