//! Content fingerprinting
//!
//! SHA-256 over the raw payload bytes is the sole cache-hit key. Filename,
//! content type and job parameters never enter the digest; the parameter
//! part of the cache key is appended separately by the record store.

use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic content fingerprint (lower-hex SHA-256, 64 chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a payload.
///
/// Pure and infallible: the empty payload is a valid, hashable input.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint(format!("{:x}", Sha256::digest(bytes)))
}
