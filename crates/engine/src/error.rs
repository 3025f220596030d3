//! Engine error types
//!
//! Every engine operation returns a typed result; nothing panics across the
//! component boundary. `Transient` is the only class a caller should retry.

use chatdesk_shared::SessionStatus;
use thiserror::Error;

/// Errors surfaced by the session/message engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session not found")]
    NotFound,

    #[error("Operation not allowed while session is {0}")]
    InvalidState(SessionStatus),

    /// Another agent won the accept race. Expected under concurrent agents;
    /// callers treat this as a normal branch, not an anomaly.
    #[error("Session was already accepted by another agent")]
    AlreadyAccepted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Body exceeds the {0} byte limit")]
    TooLong(usize),

    #[error("Caller lacks the required capability")]
    Unauthorized,

    /// Storage-layer failure. Safe to retry with backoff.
    #[error("Transient storage error: {0}")]
    Transient(String),
}

impl EngineError {
    /// Whether a caller may retry the operation automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound,
            other => {
                tracing::error!(error = %other, "Database error");
                EngineError::Transient(other.to_string())
            }
        }
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!(error = %err, "TTL store error");
        EngineError::Transient(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EngineError::NotFound));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(EngineError::Transient("io".into()).is_retryable());
        assert!(!EngineError::NotFound.is_retryable());
        assert!(!EngineError::AlreadyAccepted.is_retryable());
        assert!(!EngineError::InvalidState(SessionStatus::Closed).is_retryable());
        assert!(!EngineError::TooLong(4000).is_retryable());
    }
}
