//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatdesk_engine::EngineError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Capability errors
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    InvalidState(String),
    #[error("Session was already accepted by another agent")]
    AlreadyAccepted,

    // Internal errors
    #[error("Internal server error")]
    Internal,
    #[error("Service temporarily unavailable, retry shortly")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }

            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            // A lost accept race is an expected branch for agent UIs, not a
            // server anomaly: surfaced verbatim with its own code.
            ApiError::AlreadyAccepted => {
                (StatusCode::CONFLICT, "ALREADY_ACCEPTED", self.to_string())
            }

            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
            ApiError::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", self.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => ApiError::NotFound,
            EngineError::InvalidState(status) => ApiError::InvalidState(format!(
                "Operation not allowed while session is {}",
                status
            )),
            EngineError::AlreadyAccepted => ApiError::AlreadyAccepted,
            EngineError::InvalidInput(msg) => ApiError::BadRequest(msg),
            EngineError::TooLong(max) => {
                ApiError::PayloadTooLarge(format!("Body exceeds the {} byte limit", max))
            }
            EngineError::Unauthorized => ApiError::Unauthorized,
            EngineError::Transient(_) => ApiError::ServiceUnavailable,
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_shared::SessionStatus;

    #[test]
    fn test_engine_errors_map_to_expected_statuses() {
        let cases = [
            (EngineError::NotFound, StatusCode::NOT_FOUND),
            (
                EngineError::InvalidState(SessionStatus::Declined),
                StatusCode::CONFLICT,
            ),
            (EngineError::AlreadyAccepted, StatusCode::CONFLICT),
            (
                EngineError::InvalidInput("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::TooLong(4000), StatusCode::PAYLOAD_TOO_LARGE),
            (EngineError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                EngineError::Transient("io".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (engine_err, status) in cases {
            let api_err: ApiError = engine_err.into();
            assert_eq!(api_err.into_response().status(), status);
        }
    }

    #[test]
    fn test_already_accepted_has_distinct_code() {
        let api_err: ApiError = EngineError::AlreadyAccepted.into();
        assert!(matches!(api_err, ApiError::AlreadyAccepted));
    }
}
