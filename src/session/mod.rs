//! # Session Components
//!
//! Lifecycle of authenticated sessions keyed by unguessable tokens.
//!
//! ## Components
//! - **Registry**: sharded session map with lazy expiry
//!
//! ## Security
//! - Tokens carry 256 bits of OS randomness (64 hex chars), collision-checked
//! - Expiry is evaluated on every access; no stale session authorizes traffic

pub mod registry;

pub use registry::{SessionInfo, SessionRegistry};
