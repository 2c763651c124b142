//! SHA-256 hashing helpers.
//!
//! Content hashes identify documents for duplicate detection; the embedding
//! cache keys on a hash of the normalized input text.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes with SHA-256.
#[inline]
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash text and render the digest as lowercase hex.
pub fn sha256_hex(text: &str) -> String {
    let digest = sha256_bytes(text.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}
