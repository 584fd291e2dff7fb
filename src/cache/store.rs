//! JSON-backed hash cache shared by all hashing workers.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use rayon::prelude::*;

use super::entry::CacheEntry;
use crate::scanner::{map_hash_io_error, unix_seconds, Eligibility, HashError, Hasher};

/// Errors that can occur while reading or writing the cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No cache file exists yet.
    #[error("cache file not found: {0}")]
    NotFound(PathBuf),

    /// The cache file exists but is not a valid cache document.
    #[error("cache file is corrupt: {path}: {source}")]
    Corrupt {
        /// Cache file path
        path: PathBuf,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// The cache file or its directory is not accessible.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The in-memory cache could not be serialized.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    /// Stable reason code for logs and callers.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::Corrupt { .. } => "corrupt",
            Self::PermissionDenied(_) => "permission-denied",
            Self::Io { .. } => "io",
            Self::Serialize(_) => "serialize",
        }
    }
}

/// Result alias for cache persistence.
pub type CacheResult<T> = Result<T, CacheError>;

fn map_cache_io_error(path: &Path, error: io::Error) -> CacheError {
    match error.kind() {
        io::ErrorKind::NotFound => CacheError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => CacheError::PermissionDenied(path.to_path_buf()),
        _ => CacheError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Below the size threshold, excluded by name, or not a regular file.
    Ineligible,
    /// Served from the cache without reading content.
    Cached(String),
    /// Freshly computed and stored.
    Computed(String),
}

impl Lookup {
    /// The digest, if the file was eligible.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Ineligible => None,
            Self::Cached(d) | Self::Computed(d) => Some(d),
        }
    }

    /// Consume into the digest, if any.
    #[must_use]
    pub fn into_digest(self) -> Option<String> {
        match self {
            Self::Ineligible => None,
            Self::Cached(d) | Self::Computed(d) => Some(d),
        }
    }
}

/// Persistent path → digest cache.
///
/// Entries live in a sharded concurrent map, so every hashing worker can
/// read and insert without an outer lock. Persistence is a whole-file JSON
/// snapshot written atomically (temp file + rename).
pub struct HashCache {
    path: PathBuf,
    entries: DashMap<PathBuf, CacheEntry>,
    hasher: Hasher,
    rules: Eligibility,
    checkpoint_every: usize,
    computed: AtomicUsize,
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("hasher", &self.hasher)
            .field("checkpoint_every", &self.checkpoint_every)
            .finish()
    }
}

impl HashCache {
    /// Create an empty cache that will persist to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, hasher: Hasher, rules: Eligibility) -> Self {
        Self::with_entries(path.into(), HashMap::new(), hasher, rules)
    }

    fn with_entries(
        path: PathBuf,
        entries: HashMap<PathBuf, CacheEntry>,
        hasher: Hasher,
        rules: Eligibility,
    ) -> Self {
        Self {
            path,
            entries: entries.into_iter().collect(),
            hasher,
            rules,
            checkpoint_every: 0,
            computed: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
        }
    }

    /// Save a snapshot after every `n` freshly computed digests (0 disables).
    #[must_use]
    pub fn with_checkpoint_every(mut self, n: usize) -> Self {
        self.checkpoint_every = n;
        self
    }

    /// Load the cache file, dropping entries whose path no longer exists.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] distinguishing a missing file, a corrupt
    /// file and an unreadable one.
    pub fn try_load(
        path: impl Into<PathBuf>,
        hasher: Hasher,
        rules: Eligibility,
    ) -> CacheResult<Self> {
        let path = path.into();
        let raw = Self::read_entries(&path)?;
        let total = raw.len();

        let live: HashMap<PathBuf, CacheEntry> = raw
            .into_par_iter()
            .filter(|(p, _)| p.exists())
            .collect();

        log::debug!(
            "Loaded {} cache entries from {} ({} stale paths dropped)",
            live.len(),
            path.display(),
            total - live.len()
        );
        Ok(Self::with_entries(path, live, hasher, rules))
    }

    /// Load the cache file, falling back to an empty cache on any error.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>, hasher: Hasher, rules: Eligibility) -> Self {
        let path = path.into();
        match Self::try_load(path.clone(), hasher, rules.clone()) {
            Ok(cache) => cache,
            Err(CacheError::NotFound(_)) => {
                log::debug!("No cache file at {}, starting empty", path.display());
                Self::new(path, hasher, rules)
            }
            Err(e) => {
                log::warn!("Ignoring cache ({}): {}", e.reason(), e);
                Self::new(path, hasher, rules)
            }
        }
    }

    /// Read the raw mapping from a cache file without any filtering.
    ///
    /// A zero-length file is an empty cache.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the file is missing, unreadable or corrupt.
    pub fn read_entries(path: &Path) -> CacheResult<HashMap<PathBuf, CacheEntry>> {
        let content = fs::read_to_string(path).map_err(|e| map_cache_io_error(path, e))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of entries in a cache file, as reported by the status query.
    ///
    /// # Errors
    ///
    /// Same as [`HashCache::read_entries`].
    pub fn count_entries(path: &Path) -> CacheResult<usize> {
        Self::read_entries(path).map(|entries| entries.len())
    }

    /// Persist the cache.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the snapshot cannot be written.
    pub fn save(&self) -> CacheResult<()> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_snapshot()
    }

    /// Persist the cache, logging instead of returning failures.
    pub fn save_or_log(&self) -> bool {
        match self.save() {
            Ok(()) => {
                log::debug!(
                    "Saved {} cache entries to {}",
                    self.entries.len(),
                    self.path.display()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save cache ({}): {}", e.reason(), e);
                false
            }
        }
    }

    fn write_snapshot(&self) -> CacheResult<()> {
        let snapshot: BTreeMap<String, CacheEntry> = self
            .entries
            .iter()
            .filter_map(|item| match item.key().to_str() {
                Some(key) => Some((key.to_string(), item.value().clone())),
                None => {
                    log::debug!("Not persisting non-UTF-8 path: {}", item.key().display());
                    None
                }
            })
            .collect();
        let json = serde_json::to_string(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| map_cache_io_error(parent, e))?;
        }
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        fs::write(&tmp, json).map_err(|e| map_cache_io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            map_cache_io_error(&self.path, e)
        })
    }

    fn note_computed(&self) {
        let n = self.computed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.checkpoint_every == 0 || n % self.checkpoint_every != 0 {
            return;
        }
        // A checkpoint already in progress covers this one
        let Ok(_guard) = self.save_lock.try_lock() else {
            return;
        };
        match self.write_snapshot() {
            Ok(()) => log::debug!("Cache checkpoint after {} new hashes", n),
            Err(e) => log::warn!("Cache checkpoint failed ({}): {}", e.reason(), e),
        }
    }

    /// Stat the file and return its digest, hashing only when needed.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be stat'ed or read.
    pub fn lookup(&self, path: &Path) -> Result<Lookup, HashError> {
        let metadata = fs::metadata(path).map_err(|e| map_hash_io_error(path, e))?;
        let size = metadata.len();
        if !metadata.is_file() || !self.rules.is_eligible(path, size) {
            return Ok(Lookup::Ineligible);
        }
        let mtime = unix_seconds(metadata.modified().map_err(|e| map_hash_io_error(path, e))?);

        if let Some(entry) = self.entries.get(path) {
            if entry.is_fresh(size, mtime) {
                return Ok(Lookup::Cached(entry.hash.clone()));
            }
        }

        let digest = self.hasher.hash_file(path)?;
        self.entries
            .insert(path.to_path_buf(), CacheEntry::new(size, mtime, digest.clone()));
        self.note_computed();
        Ok(Lookup::Computed(digest))
    }

    /// Digest for an eligible file; `None` for ineligible or unreadable ones.
    ///
    /// Errors are logged and the file is skipped for this run.
    pub fn get_or_compute(&self, path: &Path) -> Option<String> {
        match self.lookup(path) {
            Ok(lookup) => lookup.into_digest(),
            Err(e) => {
                log::warn!("Error: {} ({})", path.display(), e);
                None
            }
        }
    }

    /// Cached entry for a path, if present.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<CacheEntry> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    /// Insert or replace an entry directly.
    pub fn insert(&self, path: PathBuf, entry: CacheEntry) {
        self.entries.insert(path, entry);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digests computed (not served from cache) since this cache was created.
    #[must_use]
    pub fn computed_count(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// File the cache persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hasher used for cache misses.
    #[must_use]
    pub fn hasher(&self) -> Hasher {
        self.hasher
    }
}
