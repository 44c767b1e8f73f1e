//! Credential hashing.
//!
//! Clients hash passwords before they touch the wire; the broker stores and
//! compares digests only. The digest is hex-encoded SHA-256 of the UTF-8
//! password bytes.

use sha2::{Digest, Sha256};

/// Hash a password to its hex SHA-256 digest.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check a plaintext password against a stored digest.
pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password) == digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_hex_sha256() {
        let digest = hash_password("admin123");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_roundtrip() {
        let digest = hash_password("s3cret");
        assert!(verify_password("s3cret", &digest));
        assert!(!verify_password("s3cret!", &digest));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(hash_password("abc"), hash_password("abc"));
    }
}
