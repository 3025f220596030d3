//! Shared application state

use std::sync::Arc;

use chatdesk_engine::ChatEngine;
use sqlx::PgPool;

use crate::{
    auth::{AuthState, ChatTokenManager},
    config::Config,
};

/// State shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub engine: ChatEngine,
    pub config: Arc<Config>,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(pool: PgPool, engine: ChatEngine, config: Config) -> Self {
        let auth = AuthState {
            tokens: ChatTokenManager::new(&config.jwt_secret, config.jwt_expiry_hours),
        };
        Self {
            pool,
            engine,
            config: Arc::new(config),
            auth,
        }
    }

    /// The slice of state the auth middleware needs.
    pub fn auth_state(&self) -> AuthState {
        self.auth.clone()
    }
}
