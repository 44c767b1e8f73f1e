//! # Authentication Components
//!
//! Credential storage, failed-attempt tracking, and lockout enforcement.
//!
//! ## Components
//! - **Store**: sharded credential store with per-username lockout state
//!
//! ## Security
//! - Unknown-user and wrong-password failures are indistinguishable to the
//!   peer (no username enumeration)
//! - Lockout state persists through the storage collaborator so restarts do
//!   not reset brute-force counters

pub mod store;

pub use store::{AuthOutcome, CredentialStore, UserRecord};
