//! Engine configuration
//!
//! All limits are injected here at construction. The engine never reads
//! ambient global state.

use std::time::Duration;

/// Tunable limits and windows for the chat engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum message body length in bytes.
    pub max_message_len: usize,
    /// Maximum attachment size in bytes.
    pub max_attachment_bytes: i64,
    /// Accepted attachment MIME types. Empty means "reject all".
    pub allowed_attachment_mime: Vec<String>,
    /// Base URL attachment links are minted under.
    pub attachment_base_url: String,
    /// How long a typing flag stays live without a refresh.
    pub typing_ttl: Duration,
    /// How long an agent presence heartbeat stays live.
    pub presence_ttl: Duration,
    /// Pending sessions older than this are eligible for auto-decline.
    pub pending_accept_window: Duration,
    /// Active sessions idle longer than this are eligible for auto-close.
    pub idle_close_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_len: 4_000,
            max_attachment_bytes: 5 * 1024 * 1024,
            allowed_attachment_mime: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/gif".to_string(),
                "application/pdf".to_string(),
                "text/plain".to_string(),
            ],
            attachment_base_url: "http://localhost:3000".to_string(),
            typing_ttl: Duration::from_secs(5),
            presence_ttl: Duration::from_secs(30),
            pending_accept_window: Duration::from_secs(120),
            idle_close_window: Duration::from_secs(30 * 60),
        }
    }
}
