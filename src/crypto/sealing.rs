//! Payload sealing with ChaCha20-Poly1305.
//!
//! Seals message bodies into a self-describing envelope of base64 fields
//! (`ciphertext`, `nonce`, `tag`, `aad`). The AAD is authenticated but not
//! encrypted; tampering with any field fails decryption.
//!
//! The sealing key is derived from a master key string with SHA-256 over the
//! key material and a domain-separation salt.
//!
//! ## Nonce discipline
//!
//! Nonces are counter-based per sealer instance, not random. This keeps the
//! envelope small and deterministic, but it means a deployment that restarts
//! a sealer with the same master key MUST persist the counter across
//! restarts, or rotate the key, to avoid catastrophic nonce reuse. The
//! broker core never relies on sealing, so the in-process counter is
//! sufficient here.

use crate::error::{BrokerError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Poly1305 authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Domain-separation salt mixed into key derivation.
const KEY_SALT: &[u8] = b"remote-broker.sealing.v1";

/// A sealed message body. All fields are base64; `aad` is carried in the
/// clear but covered by the authentication tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
    pub aad: Option<String>,
}

/// Seals and opens payloads under a key derived from a master key string.
pub struct PayloadSealer {
    cipher: ChaCha20Poly1305,
    nonce_counter: AtomicU64,
}

impl PayloadSealer {
    /// Create a sealer from a master key string.
    pub fn new(master_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master_key.as_bytes());
        hasher.update(KEY_SALT);
        let key_bytes = hasher.finalize();

        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key_bytes)),
            nonce_counter: AtomicU64::new(0),
        }
    }

    /// Next 12-byte nonce: a big-endian counter in the low 8 bytes.
    fn next_nonce(&self) -> [u8; 12] {
        let counter = self.nonce_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut nonce = [0u8; 12];
        nonce[4..].copy_from_slice(&counter.to_be_bytes());
        nonce
    }

    /// Seal `plaintext`, optionally binding `aad` into the authentication
    /// tag.
    pub fn encrypt(&self, plaintext: &str, aad: Option<&str>) -> Result<SealedPayload> {
        let nonce = self.next_nonce();
        let aad_bytes = aad.map(str::as_bytes).unwrap_or_default();

        let mut sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: aad_bytes,
                },
            )
            .map_err(|_| BrokerError::EncryptionFailure)?;

        // The AEAD output is ciphertext || tag; split them so the envelope
        // mirrors the wire shape consumers expect.
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(SealedPayload {
            ciphertext: BASE64.encode(&sealed),
            nonce: BASE64.encode(nonce),
            tag: BASE64.encode(&tag),
            aad: aad.map(|a| BASE64.encode(a.as_bytes())),
        })
    }

    /// Open a sealed payload, verifying the tag over ciphertext and AAD.
    pub fn decrypt(&self, sealed: &SealedPayload) -> Result<String> {
        let nonce = BASE64
            .decode(&sealed.nonce)
            .map_err(|_| BrokerError::DecryptionFailure)?;
        let mut ciphertext = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|_| BrokerError::DecryptionFailure)?;
        let tag = BASE64
            .decode(&sealed.tag)
            .map_err(|_| BrokerError::DecryptionFailure)?;

        let aad_bytes = match &sealed.aad {
            Some(aad) => BASE64
                .decode(aad)
                .map_err(|_| BrokerError::DecryptionFailure)?,
            None => Vec::new(),
        };

        if nonce.len() != 12 || tag.len() != TAG_LEN {
            return Err(BrokerError::DecryptionFailure);
        }

        ciphertext.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: &aad_bytes,
                },
            )
            .map_err(|_| BrokerError::DecryptionFailure)?;

        String::from_utf8(plaintext).map_err(|_| BrokerError::DecryptionFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealer = PayloadSealer::new("test-master-key");
        let sealed = sealer.encrypt("hello world", Some("session-1")).unwrap();
        assert_eq!(sealed.aad, Some(BASE64.encode("session-1")));

        let opened = sealer.decrypt(&sealed).unwrap();
        assert_eq!(opened, "hello world");
    }

    #[test]
    fn test_roundtrip_without_aad() {
        let sealer = PayloadSealer::new("test-master-key");
        let sealed = sealer.encrypt("payload", None).unwrap();
        assert_eq!(sealer.decrypt(&sealed).unwrap(), "payload");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let sealer = PayloadSealer::new("test-master-key");
        let mut sealed = sealer.encrypt("hello", None).unwrap();

        let mut bytes = BASE64.decode(&sealed.ciphertext).unwrap();
        if let Some(b) = bytes.first_mut() {
            *b ^= 0xFF;
        }
        sealed.ciphertext = BASE64.encode(&bytes);

        assert!(matches!(
            sealer.decrypt(&sealed),
            Err(BrokerError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_tampered_aad_rejected() {
        let sealer = PayloadSealer::new("test-master-key");
        let mut sealed = sealer.encrypt("hello", Some("session-1")).unwrap();
        sealed.aad = Some(BASE64.encode("session-2"));

        assert!(sealer.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_nonces_advance() {
        let sealer = PayloadSealer::new("test-master-key");
        let a = sealer.encrypt("x", None).unwrap();
        let b = sealer.encrypt("x", None).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sealer = PayloadSealer::new("key-a");
        let other = PayloadSealer::new("key-b");
        let sealed = sealer.encrypt("hello", None).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }
}
