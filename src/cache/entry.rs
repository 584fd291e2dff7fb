//! Cache entry definitions.

use serde::{Deserialize, Serialize};

/// Represents a single file entry in the hash cache.
///
/// The file path is the key of the surrounding map; the entry records the
/// stat fingerprint the digest was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File size in bytes at hashing time.
    pub size: u64,
    /// Modification time in whole seconds since the Unix epoch.
    pub mtime: i64,
    /// Hex digest of the content.
    pub hash: String,
}

impl CacheEntry {
    /// Create a new cache entry.
    #[must_use]
    pub fn new(size: u64, mtime: i64, hash: impl Into<String>) -> Self {
        Self {
            size,
            mtime,
            hash: hash.into(),
        }
    }

    /// Whether the entry still describes a file with this size and mtime.
    ///
    /// Only the stat fingerprint is compared; content rewritten in place
    /// with the same size and mtime is not detected.
    #[must_use]
    pub fn is_fresh(&self, size: u64, mtime: i64) -> bool {
        self.size == size && self.mtime == mtime
    }
}
