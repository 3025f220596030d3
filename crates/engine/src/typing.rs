//! Typing indicators and agent presence, backed by a Redis TTL store.
//!
//! Every write fully replaces the value for its key, so last-writer-wins is
//! the only race here and typing state is advisory and self-expiring.

use chatdesk_shared::{Party, TypingState};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use uuid::Uuid;

use crate::{config::EngineConfig, error::EngineResult};

const ANY_AGENT_KEY: &str = "chat:presence:any_agent";

/// Short-lived key/value store for typing flags and presence heartbeats.
#[derive(Clone)]
pub struct TypingStore {
    conn: ConnectionManager,
    typing_ttl: Duration,
    presence_ttl: Duration,
}

impl TypingStore {
    pub async fn connect(redis_url: &str, config: &EngineConfig) -> EngineResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            typing_ttl: config.typing_ttl,
            presence_ttl: config.presence_ttl,
        })
    }

    fn typing_key(session_id: Uuid, party: Party) -> String {
        format!("chat:typing:{}:{}", session_id, party.as_str())
    }

    fn presence_key(agent_id: Uuid) -> String {
        format!("chat:presence:agent:{}", agent_id)
    }

    /// Set or clear a typing flag. The entry expires on its own after the
    /// configured TTL, so a client that stops refreshing simply goes quiet.
    pub async fn set_typing(
        &self,
        session_id: Uuid,
        party: Party,
        is_typing: bool,
    ) -> EngineResult<()> {
        let mut conn = self.conn.clone();
        let key = Self::typing_key(session_id, party);
        if is_typing {
            conn.set_ex::<_, _, ()>(&key, "1", self.typing_ttl.as_secs())
                .await?;
        } else {
            conn.del::<_, ()>(&key).await?;
        }
        Ok(())
    }

    /// Read both typing flags for a session. Store errors degrade to "not
    /// typing" so a flaky TTL store never fails a poll.
    pub async fn typing_state(&self, session_id: Uuid) -> TypingState {
        TypingState {
            visitor: self
                .read_flag(Self::typing_key(session_id, Party::Visitor))
                .await,
            agent: self
                .read_flag(Self::typing_key(session_id, Party::Agent))
                .await,
        }
    }

    /// Refresh an agent's presence heartbeat.
    pub async fn heartbeat_agent(&self, agent_id: Uuid) -> EngineResult<()> {
        let mut conn = self.conn.clone();
        let secs = self.presence_ttl.as_secs();
        conn.set_ex::<_, _, ()>(Self::presence_key(agent_id), "1", secs)
            .await?;
        // Coarse flag the visitor widget reads before offering live chat.
        conn.set_ex::<_, _, ()>(ANY_AGENT_KEY, "1", secs).await?;
        Ok(())
    }

    /// Whether any agent has heartbeated within the presence TTL.
    pub async fn any_agent_online(&self) -> bool {
        self.read_flag(ANY_AGENT_KEY.to_string()).await
    }

    /// Connectivity check for health probes.
    pub async fn ping(&self) -> EngineResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn read_flag(&self, key: String) -> bool {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "TTL store read failed, reading as false");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_keys_are_per_session_and_role() {
        let session = Uuid::new_v4();
        let visitor = TypingStore::typing_key(session, Party::Visitor);
        let agent = TypingStore::typing_key(session, Party::Agent);
        assert_ne!(visitor, agent);
        assert!(visitor.ends_with(":visitor"));
        assert!(agent.ends_with(":agent"));
        assert!(visitor.contains(&session.to_string()));
    }

    #[test]
    fn test_presence_key_is_per_agent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_ne!(TypingStore::presence_key(a), TypingStore::presence_key(b));
    }
}
