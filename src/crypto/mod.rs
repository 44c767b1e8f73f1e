//! # Cryptographic Collaborators
//!
//! Credential hashing and optional payload sealing.
//!
//! The broker core treats cryptography as injected capability: message
//! dispatch and session bookkeeping never depend on it, but both halves are
//! provided here so deployments can seal message bodies end to end and store
//! digests instead of passwords.
//!
//! ## Components
//! - **Password**: SHA-256 credential digests (hex-encoded)
//! - **Sealing**: ChaCha20-Poly1305 AEAD envelopes with optional AAD

pub mod password;
pub mod sealing;

pub use sealing::{PayloadSealer, SealedPayload};
