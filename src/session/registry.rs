//! # Session Registry
//!
//! Creates, validates, touches, and ends sessions keyed by an unguessable
//! token.
//!
//! Sessions are partitioned into shards by token hash, so per-session
//! operations on different tokens never contend. Expiry is lazy: validity is
//! checked on access rather than by a background sweep (a periodic sweep is
//! a possible hardening, not part of the core contract). Records persist
//! through the storage collaborator on create and end, and reload on startup
//! with expired records dropped.

use crate::config::SessionConfig;
use crate::error::{BrokerError, Result};
use crate::storage::Storage;
use crate::utils::time;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info};

const SHARD_COUNT: usize = 16;

const SESSION_KEY_PREFIX: &str = "session:";

/// Token length in random bytes; hex-encoded to twice as many characters.
const TOKEN_BYTES: usize = 32;

/// A live session record. Owned exclusively by the registry; handlers hold
/// only the session id.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub username: String,
    pub device_name: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub last_activity: SystemTime,
}

impl SessionInfo {
    fn is_expired(&self) -> bool {
        self.expires_at <= SystemTime::now()
    }
}

/// Persisted mirror of [`SessionInfo`], epoch seconds.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    username: String,
    device_name: String,
    created_at: u64,
    expires_at: u64,
    last_activity: u64,
}

impl From<&SessionInfo> for PersistedSession {
    fn from(info: &SessionInfo) -> Self {
        Self {
            username: info.username.clone(),
            device_name: info.device_name.clone(),
            created_at: time::unix_secs(info.created_at),
            expires_at: time::unix_secs(info.expires_at),
            last_activity: time::unix_secs(info.last_activity),
        }
    }
}

impl From<PersistedSession> for SessionInfo {
    fn from(p: PersistedSession) -> Self {
        Self {
            username: p.username,
            device_name: p.device_name,
            created_at: time::from_unix_secs(p.created_at),
            expires_at: time::from_unix_secs(p.expires_at),
            last_activity: time::from_unix_secs(p.last_activity),
        }
    }
}

/// Sharded, persistence-backed session registry shared by every connection
/// handler.
pub struct SessionRegistry {
    shards: Vec<Mutex<HashMap<String, SessionInfo>>>,
    session_ttl: Duration,
    storage: Arc<dyn Storage>,
}

impl SessionRegistry {
    /// Open the registry, reloading live sessions from storage. Expired
    /// records are dropped (and removed from storage) during the reload.
    pub async fn open(config: &SessionConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let registry = Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            session_ttl: config.session_ttl,
            storage,
        };
        registry.load().await?;
        Ok(registry)
    }

    async fn load(&self) -> Result<()> {
        let mut live = 0usize;
        let mut expired = 0usize;

        for (key, value) in self.storage.scan(SESSION_KEY_PREFIX).await? {
            let session_id = key.trim_start_matches(SESSION_KEY_PREFIX).to_string();
            let persisted: PersistedSession = serde_json::from_value(value).map_err(|e| {
                BrokerError::StorageError(format!("bad session record '{key}': {e}"))
            })?;
            let info = SessionInfo::from(persisted);

            if info.is_expired() {
                self.storage.delete(&key).await?;
                expired += 1;
                continue;
            }

            self.shard_for(&session_id).lock().await.insert(session_id, info);
            live += 1;
        }

        debug!(live, expired, "Session registry loaded");
        Ok(())
    }

    fn shard_for(&self, session_id: &str) -> &Mutex<HashMap<String, SessionInfo>> {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }

    /// Generate a fresh session token: 32 bytes of OS randomness, hex.
    fn generate_token() -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::fill(&mut bytes)
            .map_err(|e| BrokerError::Custom(format!("OS randomness unavailable: {e}")))?;
        Ok(hex::encode(bytes))
    }

    /// Create a session for an authenticated user and return its token.
    ///
    /// Token collisions against live sessions are astronomically rare but
    /// handled: the token is regenerated until it is unique.
    pub async fn create_session(&self, username: &str, device_name: &str) -> Result<String> {
        loop {
            let session_id = Self::generate_token()?;
            let mut shard = self.shard_for(&session_id).lock().await;
            if shard.contains_key(&session_id) {
                continue;
            }

            let now = SystemTime::now();
            let info = SessionInfo {
                username: username.to_string(),
                device_name: device_name.to_string(),
                created_at: now,
                expires_at: now + self.session_ttl,
                last_activity: now,
            };

            self.persist(&session_id, &info).await?;
            shard.insert(session_id.clone(), info);
            info!(username, session_id = %session_id, "Session created");
            return Ok(session_id);
        }
    }

    /// Whether the session exists and has not expired.
    pub async fn is_valid(&self, session_id: &str) -> bool {
        let shard = self.shard_for(session_id).lock().await;
        shard.get(session_id).map(|s| !s.is_expired()).unwrap_or(false)
    }

    /// Refresh `last_activity`. No-op for unknown sessions; callers are
    /// expected to have validated first.
    pub async fn touch(&self, session_id: &str) {
        let mut shard = self.shard_for(session_id).lock().await;
        if let Some(info) = shard.get_mut(session_id) {
            info.last_activity = SystemTime::now();
        }
    }

    /// End a session. Idempotent: ending a missing or already-ended session
    /// is not an error.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let removed = self.shard_for(session_id).lock().await.remove(session_id);
        if removed.is_some() {
            self.storage
                .delete(&format!("{SESSION_KEY_PREFIX}{session_id}"))
                .await?;
            info!(session_id = %session_id, "Session ended");
        }
        Ok(())
    }

    /// Read-only lookup for diagnostics and authorization decisions.
    pub async fn get_info(&self, session_id: &str) -> Option<SessionInfo> {
        let shard = self.shard_for(session_id).lock().await;
        shard.get(session_id).cloned()
    }

    async fn persist(&self, session_id: &str, info: &SessionInfo) -> Result<()> {
        let value = serde_json::to_value(PersistedSession::from(info))
            .map_err(|e| BrokerError::StorageError(e.to_string()))?;
        self.storage
            .put(&format!("{SESSION_KEY_PREFIX}{session_id}"), value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    async fn registry_with_ttl(ttl: Duration) -> SessionRegistry {
        let config = SessionConfig { session_ttl: ttl };
        SessionRegistry::open(&config, Arc::new(MemoryStorage::new()))
            .await
            .expect("open")
    }

    #[tokio::test]
    async fn test_token_shape() {
        let registry = registry_with_ttl(Duration::from_secs(60)).await;
        let id = registry.create_session("alice", "PC-1").await.unwrap();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let registry = registry_with_ttl(Duration::from_secs(60)).await;
        let a = registry.create_session("alice", "PC-1").await.unwrap();
        let b = registry.create_session("alice", "PC-1").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_touch_updates_last_activity() {
        let registry = registry_with_ttl(Duration::from_secs(60)).await;
        let id = registry.create_session("alice", "PC-1").await.unwrap();

        let before = registry.get_info(&id).await.unwrap().last_activity;
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.touch(&id).await;
        let after = registry.get_info(&id).await.unwrap().last_activity;

        assert!(after > before);
        // Touching a missing id is a no-op, not a panic.
        registry.touch("no-such-session").await;
    }
}
