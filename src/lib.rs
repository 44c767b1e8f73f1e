//! # remote-broker
//!
//! Session broker core for remote-desktop access: a framed JSON protocol
//! plus the connection/session/authentication state machine that mediates
//! sessions between a controlling client and a controlled device over a
//! single persistent TCP stream.
//!
//! ## Architecture
//!
//! Bytes in → [`protocol::FrameCodec`] → [`protocol::Message`] →
//! [`transport::ConnectionHandler`] (consulting [`session::SessionRegistry`]
//! and [`auth::CredentialStore`]) → [`protocol::Message`] →
//! [`protocol::FrameCodec`] → bytes out.
//!
//! ## Modules
//! - **protocol**: message envelope and length-prefixed frame codec
//! - **auth**: credential store with per-username lockout
//! - **session**: token-keyed session registry with lazy expiry
//! - **transport**: broker accept loop and per-connection state machine
//! - **storage**: persistence collaborator (get/put/delete/scan)
//! - **crypto**: password hashing and optional payload sealing
//! - **capture**: pixel-source collaborator interface
//! - **config** / **error** / **utils**: ambient plumbing
//!
//! ## Example
//! ```no_run
//! use remote_broker::config::BrokerConfig;
//! use remote_broker::storage::MemoryStorage;
//! use remote_broker::transport::Broker;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> remote_broker::Result<()> {
//!     let config = BrokerConfig::default();
//!     remote_broker::utils::logging::init(&config.logging)?;
//!
//!     let broker = Broker::open(config, Arc::new(MemoryStorage::new())).await?;
//!     broker.credentials().add_user("admin", "admin123", None).await?;
//!     broker.run().await
//! }
//! ```

pub mod auth;
pub mod capture;
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod transport;
pub mod utils;

pub use error::{BrokerError, Result};
pub use protocol::{FrameCodec, FrameEvent, Message};
pub use transport::Broker;
