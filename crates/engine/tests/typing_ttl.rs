//! Integration tests for typing signals and presence in the TTL store.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/chatdesk_test"
//! export REDIS_URL="redis://localhost:6379"
//! cargo test -p chatdesk-engine -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chatdesk_engine::{ChatEngine, Cursor, EngineConfig, EventSender, TypingStore, VisitorProfile};
use chatdesk_shared::Party;
use std::time::Duration;
use uuid::Uuid;

/// Engine with a short typing TTL so expiry is observable quickly.
async fn setup() -> ChatEngine {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    chatdesk_shared::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let config = EngineConfig {
        typing_ttl: Duration::from_secs(2),
        ..Default::default()
    };
    let typing = TypingStore::connect(&redis_url, &config)
        .await
        .expect("Failed to connect to redis");

    ChatEngine::new(pool, typing, EventSender::disabled(), config)
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_typing_flag_expires_on_its_own() {
    let engine = setup().await;
    let session = engine
        .start_session(None, VisitorProfile::default())
        .await
        .unwrap();

    engine
        .typing()
        .set_typing(session.id, Party::Visitor, true)
        .await
        .unwrap();

    // Visible immediately through poll.
    let response = engine.poll(session.id, Cursor::Start).await.unwrap();
    assert!(response.typing.visitor);
    assert!(!response.typing.agent);
    assert!(response.has_updates);

    // Gone after the TTL with no further writes.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let response = engine.poll(session.id, Cursor::Start).await.unwrap();
    assert!(!response.typing.visitor);
    assert!(!response.has_updates);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_clearing_typing_removes_flag_immediately() {
    let engine = setup().await;
    let session = engine
        .start_session(None, VisitorProfile::default())
        .await
        .unwrap();

    engine
        .typing()
        .set_typing(session.id, Party::Agent, true)
        .await
        .unwrap();
    engine
        .typing()
        .set_typing(session.id, Party::Agent, false)
        .await
        .unwrap();

    let state = engine.typing().typing_state(session.id).await;
    assert!(!state.agent);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_typing_flags_are_scoped_per_session() {
    let engine = setup().await;
    let a = engine
        .start_session(None, VisitorProfile::default())
        .await
        .unwrap();
    let b = engine
        .start_session(None, VisitorProfile::default())
        .await
        .unwrap();

    engine
        .typing()
        .set_typing(a.id, Party::Visitor, true)
        .await
        .unwrap();

    assert!(engine.typing().typing_state(a.id).await.visitor);
    assert!(!engine.typing().typing_state(b.id).await.visitor);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_agent_heartbeat_flips_availability() {
    let engine = setup().await;
    engine.typing().heartbeat_agent(Uuid::new_v4()).await.unwrap();
    assert!(engine.typing().any_agent_online().await);
}
