//! # Error Types
//!
//! Comprehensive error handling for the broker.
//!
//! This module defines all error variants that can occur while mediating a
//! session, from low-level I/O failures to protocol violations and
//! collaborator faults.
//!
//! ## Error Categories
//! - **I/O Errors**: socket read/write failures, write timeouts
//! - **Protocol Errors**: malformed frames, oversized frames
//! - **Collaborator Errors**: storage and cryptographic failures
//!
//! Authentication and session outcomes that peers must distinguish (rejected
//! credentials, lockout, expired sessions) are modeled as values
//! ([`crate::auth::AuthOutcome`], response messages), not errors; only
//! genuine faults live here.
//!
//! All errors implement `std::error::Error` for interoperability. No error in
//! this crate is process-fatal; a single connection's failure never takes
//! down the broker.

use std::io;
use thiserror::Error;

/// Error message constants shared across the crate.
///
/// Authentication failures in particular must reuse a single string so that
/// unknown-user and wrong-password rejections stay indistinguishable to the
/// peer (username enumeration resistance).
pub mod constants {
    /// The one credential-failure message shown to peers, regardless of cause.
    pub const ERR_INVALID_CREDENTIALS: &str = "Invalid username or password";

    /// Sent when a non-auth message arrives before authentication.
    pub const ERR_AUTH_REQUIRED: &str = "Authentication required";

    /// Sent when the session attached to a message is unknown or expired.
    pub const ERR_SESSION_INVALID: &str = "Invalid or expired session";

    /// Framing errors
    pub const ERR_EMPTY_MESSAGE_TYPE: &str = "Message type missing or empty";
}

/// Primary error type for all broker operations.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Oversized frame: {0} bytes declared")]
    OversizedFrame(usize),

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using `BrokerError`
pub type Result<T> = std::result::Result<T, BrokerError>;
