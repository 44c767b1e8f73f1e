//! Timestamp utilities shared by message envelopes and expiry math.
//!
//! Wall-clock timestamps on the wire are informative only; expiry decisions
//! compare `SystemTime` values directly and never parse peer-supplied
//! timestamps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
///
/// A clock earlier than the epoch yields 0 rather than an error; wire
/// timestamps are not authoritative.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Current Unix time in milliseconds, as the string carried on message
/// envelopes.
pub fn timestamp_string() -> String {
    unix_millis().to_string()
}

/// Seconds since the epoch for a `SystemTime` (0 for pre-epoch values).
pub fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Rebuild a `SystemTime` from persisted epoch seconds.
pub fn from_unix_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
