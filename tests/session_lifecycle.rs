#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Session registry lifecycle: expiry, idempotent teardown, and reload
//! across restarts.

use remote_broker::config::SessionConfig;
use remote_broker::session::SessionRegistry;
use remote_broker::storage::{MemoryStorage, Storage};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

async fn open_registry(ttl: Duration, storage: Arc<dyn Storage>) -> SessionRegistry {
    let config = SessionConfig { session_ttl: ttl };
    SessionRegistry::open(&config, storage).await.expect("open")
}

#[tokio::test]
async fn test_session_valid_until_ttl_then_invalid() {
    let registry = open_registry(Duration::from_millis(200), Arc::new(MemoryStorage::new())).await;
    let id = registry.create_session("alice", "PC-1").await.unwrap();

    assert!(registry.is_valid(&id).await);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!registry.is_valid(&id).await);
}

#[tokio::test]
async fn test_touch_does_not_extend_expiry() {
    let registry = open_registry(Duration::from_millis(200), Arc::new(MemoryStorage::new())).await;
    let id = registry.create_session("alice", "PC-1").await.unwrap();

    // Activity refreshes last_activity but expiry is fixed at creation.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(70)).await;
        registry.touch(&id).await;
    }
    assert!(!registry.is_valid(&id).await);
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let registry = open_registry(Duration::from_secs(60), Arc::new(MemoryStorage::new())).await;
    let id = registry.create_session("alice", "PC-1").await.unwrap();

    registry.end_session(&id).await.unwrap();
    assert!(!registry.is_valid(&id).await);

    // Ending again, or ending something that never existed, is not an error.
    registry.end_session(&id).await.unwrap();
    registry.end_session("no-such-session").await.unwrap();
}

#[tokio::test]
async fn test_unknown_session_invalid() {
    let registry = open_registry(Duration::from_secs(60), Arc::new(MemoryStorage::new())).await;
    assert!(!registry.is_valid(&"f".repeat(64)).await);
    assert!(registry.get_info(&"f".repeat(64)).await.is_none());
}

#[tokio::test]
async fn test_live_sessions_survive_restart() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let id = {
        let registry = open_registry(Duration::from_secs(60), Arc::clone(&storage)).await;
        registry.create_session("alice", "PC-1").await.unwrap()
    };

    let registry = open_registry(Duration::from_secs(60), Arc::clone(&storage)).await;
    assert!(registry.is_valid(&id).await);
    let info = registry.get_info(&id).await.unwrap();
    assert_eq!(info.username, "alice");
    assert_eq!(info.device_name, "PC-1");
}

#[tokio::test]
async fn test_ended_sessions_do_not_survive_restart() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let id = {
        let registry = open_registry(Duration::from_secs(60), Arc::clone(&storage)).await;
        let id = registry.create_session("alice", "PC-1").await.unwrap();
        registry.end_session(&id).await.unwrap();
        id
    };

    let registry = open_registry(Duration::from_secs(60), Arc::clone(&storage)).await;
    assert!(!registry.is_valid(&id).await);
}

#[tokio::test]
async fn test_expired_records_dropped_on_reload() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

    // Plant a record whose expiry is already in the past.
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let stale_id = "a".repeat(64);
    storage
        .put(
            &format!("session:{stale_id}"),
            json!({
                "username": "alice",
                "device_name": "PC-1",
                "created_at": now_secs - 7200,
                "expires_at": now_secs - 3600,
                "last_activity": now_secs - 3600,
            }),
        )
        .await
        .unwrap();

    let registry = open_registry(Duration::from_secs(60), Arc::clone(&storage)).await;
    assert!(!registry.is_valid(&stale_id).await);
    assert!(registry.get_info(&stale_id).await.is_none());

    // The reload also scrubbed the stale record from storage.
    assert!(storage
        .get(&format!("session:{stale_id}"))
        .await
        .unwrap()
        .is_none());
}
