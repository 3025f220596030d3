//! Integration tests for session lifecycle transitions.
//!
//! These exercise the real engine against Postgres and Redis:
//! accept exclusivity under racing agents, idempotent close, idempotent
//! start, and the terminal-state guards.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/chatdesk_test"
//! export REDIS_URL="redis://localhost:6379"
//! cargo test -p chatdesk-engine -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chatdesk_engine::{
    ChatEngine, EngineConfig, EngineError, EventSender, NewMessage, TypingStore, VisitorProfile,
};
use chatdesk_shared::{Sender, SessionStatus};
use uuid::Uuid;

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

    let config = EngineConfig::default();
    let typing = TypingStore::connect(&redis_url, &config)
        .await
        .expect("Failed to connect to redis");

    ChatEngine::new(pool, typing, EventSender::disabled(), config)
}

fn profile(name: &str) -> VisitorProfile {
    VisitorProfile {
        name: Some(name.to_string()),
        email: Some(format!("{}@example.com", name)),
        ip: Some("203.0.113.7".to_string()),
    }
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_accept_is_exclusive_under_race() {
    let engine = setup().await;
    let session = engine
        .start_session(None, profile("race"))
        .await
        .expect("start failed");

    let agent_a = Uuid::new_v4();
    let agent_b = Uuid::new_v4();

    let (a, b) = tokio::join!(
        engine.accept_session(session.id, agent_a),
        engine.accept_session(session.id, agent_b),
    );

    // Exactly one winner, and the loser sees AlreadyAccepted.
    let (winner, loser) = match (&a, &b) {
        (Ok(_), Err(_)) => (agent_a, b.unwrap_err()),
        (Err(_), Ok(_)) => (agent_b, a.unwrap_err()),
        other => panic!("expected one winner and one loser, got {:?}", other),
    };
    assert!(matches!(loser, EngineError::AlreadyAccepted));

    let settled = engine.get_session(session.id).await.unwrap();
    assert_eq!(settled.status, SessionStatus::Active);
    assert_eq!(settled.agent_id, Some(winner));

    // The winner's transition also appended the join message atomically.
    let transcript = engine.transcript(session.id).await.unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender, Sender::System);
    assert_eq!(transcript[0].seq, 1);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_close_is_idempotent() {
    let engine = setup().await;
    let session = engine.start_session(None, profile("close")).await.unwrap();
    engine
        .accept_session(session.id, Uuid::new_v4())
        .await
        .unwrap();

    let first = engine
        .close_session(session.id, Some("resolved".to_string()))
        .await
        .unwrap();
    assert_eq!(first.status, SessionStatus::Closed);
    assert_eq!(first.close_notes.as_deref(), Some("resolved"));
    let closed_at = first.closed_at.expect("closed_at must be stamped");

    let second = engine.close_session(session.id, None).await.unwrap();
    assert_eq!(second.status, SessionStatus::Closed);
    assert_eq!(second.closed_at, Some(closed_at));
    assert_eq!(second.close_notes.as_deref(), Some("resolved"));
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_close_pending_is_invalid() {
    let engine = setup().await;
    let session = engine.start_session(None, profile("early")).await.unwrap();

    let err = engine.close_session(session.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidState(SessionStatus::Pending)
    ));
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_declined_session_cannot_be_accepted() {
    let engine = setup().await;
    let session = engine.start_session(None, profile("gone")).await.unwrap();
    engine
        .decline_session(session.id, Some("no agents available".to_string()))
        .await
        .unwrap();

    let err = engine
        .accept_session(session.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidState(SessionStatus::Declined)
    ));

    let settled = engine.get_session(session.id).await.unwrap();
    assert_eq!(settled.agent_id, None);
    assert_eq!(settled.close_notes.as_deref(), Some("no agents available"));
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_start_is_idempotent_for_identified_visitor() {
    let engine = setup().await;
    let visitor_id = Uuid::new_v4();

    let first = engine
        .start_session(Some(visitor_id), profile("repeat"))
        .await
        .unwrap();
    let second = engine
        .start_session(Some(visitor_id), profile("repeat"))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    // Once the session is terminal the visitor can start fresh.
    engine.decline_session(first.id, None).await.unwrap();
    let third = engine
        .start_session(Some(visitor_id), profile("repeat"))
        .await
        .unwrap();
    assert_ne!(third.id, first.id);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_accept_unknown_session_is_not_found() {
    let engine = setup().await;
    let err = engine
        .accept_session(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound));
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_append_requires_active_session() {
    let engine = setup().await;
    let session = engine.start_session(None, profile("quiet")).await.unwrap();

    let err = engine
        .append(session.id, Sender::Visitor, NewMessage::text("hello?"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidState(SessionStatus::Pending)
    ));

    // The failed append must not burn a seq: the next successful append
    // starts the gap-free sequence after the system join message.
    engine
        .accept_session(session.id, Uuid::new_v4())
        .await
        .unwrap();
    let msg = engine
        .append(session.id, Sender::Visitor, NewMessage::text("hello"))
        .await
        .unwrap();
    assert_eq!(msg.seq, 2);
}

#[tokio::test]
#[ignore] // Requires database and redis
async fn test_convert_to_ticket_is_idempotent() {
    let engine = setup().await;
    let session = engine.start_session(None, profile("ticket")).await.unwrap();
    engine
        .accept_session(session.id, Uuid::new_v4())
        .await
        .unwrap();
    engine
        .append(session.id, Sender::Visitor, NewMessage::text("my order is late"))
        .await
        .unwrap();
    engine
        .close_session(session.id, Some("escalated".to_string()))
        .await
        .unwrap();

    let first = engine.convert_to_ticket(session.id).await.unwrap();
    let second = engine.convert_to_ticket(session.id).await.unwrap();
    assert_eq!(first, second);

    let settled = engine.get_session(session.id).await.unwrap();
    assert_eq!(settled.ticket_id, Some(first));
}
