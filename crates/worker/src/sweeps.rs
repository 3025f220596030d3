//! Timed sweeps over stale sessions.
//!
//! Transient storage errors are retried with backoff; a session that moved
//! on between listing and acting (an agent accepted it, another worker beat
//! us) is simply skipped.

use chatdesk_engine::{ChatEngine, EngineError};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use uuid::Uuid;

fn retry_strategy() -> impl Iterator<Item = std::time::Duration> {
    ExponentialBackoff::from_millis(200).take(3)
}

/// Decline pending sessions that waited longer than the accept window.
pub async fn decline_stale_pending(engine: &ChatEngine) {
    let window = engine.config().pending_accept_window;
    let ids = match engine.stale_pending_sessions(window).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list stale pending sessions");
            return;
        }
    };
    if ids.is_empty() {
        return;
    }

    tracing::info!(count = ids.len(), "Auto-declining stale pending sessions");
    for id in ids {
        run_transition(id, "auto-decline", || async {
            engine
                .decline_session(id, Some("No agent was available".to_string()))
                .await
                .map(|_| ())
        })
        .await;
    }
}

/// Close active sessions with no activity inside the idle window.
pub async fn close_idle_sessions(engine: &ChatEngine) {
    let window = engine.config().idle_close_window;
    let ids = match engine.idle_active_sessions(window).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list idle active sessions");
            return;
        }
    };
    if ids.is_empty() {
        return;
    }

    tracing::info!(count = ids.len(), "Closing idle sessions");
    for id in ids {
        run_transition(id, "idle-close", || async {
            engine
                .close_session(id, Some("Closed due to inactivity".to_string()))
                .await
                .map(|_| ())
        })
        .await;
    }
}

/// Run one transition with retry on `Transient`; anything else means the
/// session changed hands and the sweep moves on.
async fn run_transition<F, Fut>(id: Uuid, action: &str, op: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), EngineError>>,
{
    let result = Retry::spawn(retry_strategy(), || async {
        match op().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                tracing::debug!(session_id = %id, action = action, error = %e, "Sweep skipped session");
                Ok(())
            }
        }
    })
    .await;

    if let Err(e) = result {
        tracing::error!(session_id = %id, action = action, error = %e, "Sweep gave up after retries");
    }
}
