//! # Transport Components
//!
//! The TCP-facing half of the broker: accept loop, concurrency ceiling, and
//! the per-connection state machine.
//!
//! ## Components
//! - **Broker**: listener ownership, connection ceiling, graceful shutdown
//! - **Connection**: per-socket handler running
//!   `Authenticating -> Active -> Closing -> Closed`
//!
//! ## Concurrency model
//! One spawned task per accepted connection; handlers share the credential
//! store and session registry and own everything else exclusively. A failed
//! connection never affects its neighbors.

pub mod broker;
pub mod connection;

pub use broker::Broker;
pub use connection::{CloseReason, ConnectionHandler, ConnectionState};
