//! # Credential Store
//!
//! Authenticates users and tracks per-username failed attempts and lockout
//! expiry.
//!
//! State is partitioned into shards by username hash: a username's
//! check-then-set cycle (lockout check, counter increment, lockout trigger)
//! runs as one critical section under its shard lock, while unrelated
//! usernames never contend. Users and lockout state write through the
//! [`Storage`] collaborator on every mutation and reload on startup, so
//! brute-force counters survive a broker restart.
//!
//! ## Security
//! - `authenticate` returns the same rejection for unknown usernames and
//!   wrong digests, and both count toward lockout
//! - Passwords never reach this store in plaintext over the wire; `add_user`
//!   digests at rest via [`crate::crypto::password`]

use crate::config::AuthConfig;
use crate::crypto::password;
use crate::error::{constants, BrokerError, Result};
use crate::storage::Storage;
use crate::utils::time;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SHARD_COUNT: usize = 16;

const USER_KEY_PREFIX: &str = "user:";
const LOCKOUT_KEY_PREFIX: &str = "lockout:";

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials matched; counters reset.
    Accepted,
    /// Credentials did not match. The reason string is identical for
    /// unknown usernames and wrong digests.
    Rejected(String),
    /// The username is locked out; retry after the given number of seconds.
    Locked { retry_after_secs: u64 },
}

/// A provisioned user. Records are created by [`CredentialStore::add_user`]
/// and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub password_digest: String,
    pub permissions: Vec<String>,
    /// Unix milliseconds at provisioning time.
    pub created_at: u64,
}

/// Per-username failed-attempt state. Created lazily on first failure,
/// removed on success or lockout expiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AttemptState {
    failed_count: u32,
    /// Unix milliseconds until which the username is locked.
    locked_until_millis: Option<u64>,
}

#[derive(Default)]
struct Shard {
    users: HashMap<String, UserRecord>,
    attempts: HashMap<String, AttemptState>,
}

/// Sharded, persistence-backed credential store shared by every connection
/// handler.
pub struct CredentialStore {
    shards: Vec<Mutex<Shard>>,
    max_attempts: u32,
    lockout_duration: Duration,
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    /// Open the store, reloading users and lockout state from storage.
    pub async fn open(config: &AuthConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let store = Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(Shard::default())).collect(),
            max_attempts: config.max_login_attempts,
            lockout_duration: config.lockout_duration,
            storage,
        };
        store.load().await?;
        Ok(store)
    }

    async fn load(&self) -> Result<()> {
        let mut user_count = 0usize;
        for (key, value) in self.storage.scan(USER_KEY_PREFIX).await? {
            let username = key.trim_start_matches(USER_KEY_PREFIX).to_string();
            let record: UserRecord = serde_json::from_value(value)
                .map_err(|e| BrokerError::StorageError(format!("bad user record '{key}': {e}")))?;
            self.shard_for(&username).lock().await.users.insert(username, record);
            user_count += 1;
        }

        let mut lockout_count = 0usize;
        for (key, value) in self.storage.scan(LOCKOUT_KEY_PREFIX).await? {
            let username = key.trim_start_matches(LOCKOUT_KEY_PREFIX).to_string();
            let state: AttemptState = serde_json::from_value(value)
                .map_err(|e| BrokerError::StorageError(format!("bad lockout record '{key}': {e}")))?;
            self.shard_for(&username).lock().await.attempts.insert(username, state);
            lockout_count += 1;
        }

        debug!(users = user_count, lockouts = lockout_count, "Credential store loaded");
        Ok(())
    }

    fn shard_for(&self, username: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        username.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }

    /// Authenticate a username against a password digest.
    ///
    /// Lockout semantics: an active lockout short-circuits with `Locked`;
    /// an expired lockout is cleared (counter included) before credentials
    /// are evaluated; a failure increments the counter and triggers a fresh
    /// lockout at the configured threshold; success resets the counter.
    pub async fn authenticate(&self, username: &str, password_digest: &str) -> Result<AuthOutcome> {
        let mut shard = self.shard_for(username).lock().await;
        let now = time::unix_millis();

        if let Some(state) = shard.attempts.get(username) {
            if let Some(until) = state.locked_until_millis {
                if now < until {
                    let remaining = until - now;
                    return Ok(AuthOutcome::Locked {
                        retry_after_secs: remaining.div_ceil(1000),
                    });
                }
                // Lockout expired: forget it before evaluating credentials.
                shard.attempts.remove(username);
                self.delete_lockout(username).await?;
            }
        }

        let digest_matches = shard
            .users
            .get(username)
            .map(|user| user.password_digest == password_digest)
            .unwrap_or(false);

        if digest_matches {
            if shard.attempts.remove(username).is_some() {
                self.delete_lockout(username).await?;
            }
            info!(username, "User authenticated");
            return Ok(AuthOutcome::Accepted);
        }

        // Unknown username and wrong digest take the same path from here:
        // same counter, same response.
        let state = shard.attempts.entry(username.to_string()).or_default();
        state.failed_count += 1;

        if state.failed_count >= self.max_attempts {
            state.locked_until_millis = Some(now + self.lockout_duration.as_millis() as u64);
            let snapshot = state.clone();
            let retry_after_secs = self.lockout_duration.as_secs();
            self.persist_lockout(username, &snapshot).await?;
            warn!(username, "Username locked out after repeated failures");
            return Ok(AuthOutcome::Locked { retry_after_secs });
        }

        let snapshot = state.clone();
        self.persist_lockout(username, &snapshot).await?;
        warn!(username, failed_count = snapshot.failed_count, "Authentication failed");
        Ok(AuthOutcome::Rejected(
            constants::ERR_INVALID_CREDENTIALS.to_string(),
        ))
    }

    /// Provision a new user. The password is digested before it is stored;
    /// permissions default to `["view"]`.
    pub async fn add_user(
        &self,
        username: &str,
        password: &str,
        permissions: Option<Vec<String>>,
    ) -> Result<()> {
        let mut shard = self.shard_for(username).lock().await;

        if shard.users.contains_key(username) {
            return Err(BrokerError::UserExists(username.to_string()));
        }

        let record = UserRecord {
            password_digest: password::hash_password(password),
            permissions: permissions.unwrap_or_else(|| vec!["view".to_string()]),
            created_at: time::unix_millis(),
        };

        self.persist_user(username, &record).await?;
        shard.users.insert(username.to_string(), record);
        info!(username, "User created");
        Ok(())
    }

    /// Permissions of a provisioned user, for authorization decisions.
    pub async fn permissions(&self, username: &str) -> Option<Vec<String>> {
        let shard = self.shard_for(username).lock().await;
        shard.users.get(username).map(|u| u.permissions.clone())
    }

    async fn persist_user(&self, username: &str, record: &UserRecord) -> Result<()> {
        let value = serde_json::to_value(record)
            .map_err(|e| BrokerError::StorageError(e.to_string()))?;
        self.storage.put(&format!("{USER_KEY_PREFIX}{username}"), value).await
    }

    async fn persist_lockout(&self, username: &str, state: &AttemptState) -> Result<()> {
        let value = serde_json::to_value(state)
            .map_err(|e| BrokerError::StorageError(e.to_string()))?;
        self.storage.put(&format!("{LOCKOUT_KEY_PREFIX}{username}"), value).await
    }

    async fn delete_lockout(&self, username: &str) -> Result<()> {
        self.storage.delete(&format!("{LOCKOUT_KEY_PREFIX}{username}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    async fn store_with(config: AuthConfig) -> CredentialStore {
        CredentialStore::open(&config, Arc::new(MemoryStorage::new()))
            .await
            .expect("open")
    }

    #[tokio::test]
    async fn test_accept_and_reset() {
        let store = store_with(AuthConfig::default()).await;
        store.add_user("alice", "pw", None).await.unwrap();
        let digest = password::hash_password("pw");

        // A failure, then a success, then the counter is back to zero.
        store.authenticate("alice", "wrong").await.unwrap();
        assert_eq!(
            store.authenticate("alice", &digest).await.unwrap(),
            AuthOutcome::Accepted
        );
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let store = store_with(AuthConfig::default()).await;
        store.add_user("alice", "pw", None).await.unwrap();
        assert!(matches!(
            store.add_user("alice", "other", None).await,
            Err(BrokerError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_default_permissions() {
        let store = store_with(AuthConfig::default()).await;
        store.add_user("alice", "pw", None).await.unwrap();
        assert_eq!(
            store.permissions("alice").await,
            Some(vec!["view".to_string()])
        );
        assert_eq!(store.permissions("ghost").await, None);
    }

    #[tokio::test]
    async fn test_unknown_user_counts_toward_lockout() {
        let config = AuthConfig {
            max_login_attempts: 3,
            ..AuthConfig::default()
        };
        let store = store_with(config).await;

        store.authenticate("ghost", "x").await.unwrap();
        store.authenticate("ghost", "x").await.unwrap();
        assert!(matches!(
            store.authenticate("ghost", "x").await.unwrap(),
            AuthOutcome::Locked { .. }
        ));
    }
}
