//! # Persistence Collaborator
//!
//! Key-value persistence behind the Credential Store and Session Registry.
//!
//! The broker treats durable storage as an injected collaborator: stores
//! write through on mutation and reload on startup, so security-relevant
//! state (lockout counters in particular) survives a restart instead of
//! resetting brute-force protection to zero.
//!
//! ## Key layout
//! - `user:<username>` — credential records
//! - `lockout:<username>` — failed-attempt counters and lockout expiry
//! - `session:<session_id>` — live session records
//!
//! Records are `serde_json::Value` documents; the concrete on-disk layout of
//! any file-backed implementation is outside this crate.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod memory;

pub use memory::MemoryStorage;

/// Simple get/put/delete interface consumed by the Credential Store and the
/// Session Registry.
///
/// Implementations must be safe for concurrent use from many connection
/// handlers; per-call atomicity is sufficient, callers serialize their own
/// read-modify-write cycles.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous record.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Remove the record under `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All `(key, value)` pairs whose key starts with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Value)>>;
}
