//! ChatDesk API Library
//!
//! Thin HTTP binding over the chat engine: request validation, capability
//! checks, and error translation happen here; all session/message semantics
//! live in `chatdesk-engine`.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
