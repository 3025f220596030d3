//! Application configuration

use chatdesk_engine::EngineConfig;
use std::{env, time::Duration};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: String,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Email
    pub resend_api_key: String,
    pub email_from: String,
    /// Inbox that receives "visitor is waiting" alerts.
    pub support_inbox: String,

    // Chat engine limits and windows
    pub chat_max_message_len: usize,
    pub chat_max_attachment_bytes: i64,
    pub chat_allowed_attachment_mime: Vec<String>,
    pub chat_typing_ttl_secs: u64,
    pub chat_presence_ttl_secs: u64,
    pub chat_pending_accept_window_secs: u64,
    pub chat_idle_close_window_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Redis
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Email
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "ChatDesk <noreply@localhost>".to_string()),
            support_inbox: env::var("SUPPORT_INBOX")
                .unwrap_or_else(|_| "support@localhost".to_string()),

            // Chat engine
            chat_max_message_len: env::var("CHAT_MAX_MESSAGE_LEN")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .unwrap_or(4000),
            chat_max_attachment_bytes: env::var("CHAT_MAX_ATTACHMENT_BYTES")
                .unwrap_or_else(|_| "5242880".to_string()) // 5MB default
                .parse()
                .unwrap_or(5_242_880),
            chat_allowed_attachment_mime: env::var("CHAT_ALLOWED_ATTACHMENT_MIME")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| EngineConfig::default().allowed_attachment_mime),
            chat_typing_ttl_secs: env::var("CHAT_TYPING_TTL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            chat_presence_ttl_secs: env::var("CHAT_PRESENCE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            chat_pending_accept_window_secs: env::var("CHAT_PENDING_ACCEPT_WINDOW_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            chat_idle_close_window_secs: env::var("CHAT_IDLE_CLOSE_WINDOW_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
        })
    }

    /// The explicit config struct injected into the engine at construction.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_message_len: self.chat_max_message_len,
            max_attachment_bytes: self.chat_max_attachment_bytes,
            allowed_attachment_mime: self.chat_allowed_attachment_mime.clone(),
            attachment_base_url: self.public_url.clone(),
            typing_ttl: Duration::from_secs(self.chat_typing_ttl_secs),
            presence_ttl: Duration::from_secs(self.chat_presence_ttl_secs),
            pending_accept_window: Duration::from_secs(self.chat_pending_accept_window_secs),
            idle_close_window: Duration::from_secs(self.chat_idle_close_window_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        // Must be at least 32 characters
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
    }

    fn cleanup_config() {
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("CHAT_MAX_MESSAGE_LEN");
        env::remove_var("CHAT_ALLOWED_ATTACHMENT_MIME");
    }

    #[test]
    fn test_config_validation() {
        let _lock = CONFIG_TEST_MUTEX.lock().unwrap();

        // === Missing DATABASE_URL fails ===
        cleanup_config();
        env::set_var(
            "JWT_SECRET",
            "test-jwt-secret-must-be-at-least-32-characters-long",
        );
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));

        // === Short JWT secret rejected ===
        setup_minimal_config();
        env::set_var("JWT_SECRET", "too-short");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));

        // === Valid minimal config accepted with defaults ===
        setup_minimal_config();
        let config = Config::from_env().unwrap();
        assert_eq!(config.chat_max_message_len, 4000);
        assert_eq!(config.chat_typing_ttl_secs, 5);
        assert!(!config.chat_allowed_attachment_mime.is_empty());

        // === Engine config carries the limits over ===
        env::set_var("CHAT_MAX_MESSAGE_LEN", "1234");
        env::set_var("CHAT_ALLOWED_ATTACHMENT_MIME", "image/png, image/webp");
        let config = Config::from_env().unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.max_message_len, 1234);
        assert_eq!(
            engine.allowed_attachment_mime,
            vec!["image/png".to_string(), "image/webp".to_string()]
        );
        assert_eq!(engine.typing_ttl, Duration::from_secs(5));

        cleanup_config();
    }
}
