//! De-identified linkage-key hashing.
//!
//! Produces a salted SHA-256 digest of a demographic string, independent of
//! the blocking-key pipeline — useful for building reproducible linkage
//! keys to hand to an external system, or for fixtures in a test suite that
//! wants a stable identifier without storing raw PII.

use sha2::{Digest, Sha256};

/// Hash `payload` with `salt`, returning a lowercase hex-encoded SHA-256
/// digest of `salt + "\n" + payload`. The salt is prepended, separated from
/// the payload by a single newline — match this order exactly when
/// reproducing a hash computed elsewhere.
pub fn generate_hash_str(payload: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String cannot fail");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_deterministic_and_salt_sensitive() {
        let a = generate_hash_str("John Shepard", "salt-one");
        let b = generate_hash_str("John Shepard", "salt-one");
        let c = generate_hash_str("John Shepard", "salt-two");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn matches_the_documented_test_vector() {
        let hash = generate_hash_str(
            "John-Shepard-2153/11/07-1234 Silversun Strip Boston Massachusetts 99999",
            "super-legit-salt",
        );
        assert_eq!(
            hash,
            "27e5df427b08acaecf7bc59d853075727a811edea006546162d03e3f3272a08b"
        );
    }

    #[test]
    fn different_payloads_hash_differently() {
        let salt = "super-legit-salt";
        let a = generate_hash_str(
            "John-Shepard-2153/11/07-1234 Silversun Strip Boston Massachusetts 99999",
            salt,
        );
        let b = generate_hash_str("Tali-Zora-Vas-Normandy-2160/05/14-PO Box 1 Rock Rannoch", salt);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
    }
}
