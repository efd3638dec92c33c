//! Content addressing for snippet sources.
//!
//! A [`CacheKey`] is the lowercase hex SHA-256 digest of the trimmed snippet,
//! so snippets that differ only in surrounding whitespace share one cache
//! entry and keys stay valid across process restarts.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hex characters shown in placeholders and log lines.
const SHORT_LEN: usize = 12;

/// Trim surrounding whitespace from a snippet before hashing or rendering.
pub fn normalize(source: &str) -> &str {
    source.trim()
}

/// Fixed-length content hash of a normalized snippet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a raw snippet.
    pub fn from_source(source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(source).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix used for operator-facing correlation.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
