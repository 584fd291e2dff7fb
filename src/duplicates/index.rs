//! Per-tree digest index built by a bounded pool of hashing workers.
//!
//! # Overview
//!
//! [`TreeScanner::scan`] walks one tree, sends every regular file through
//! [`HashCache::lookup`] on a rayon pool limited to the configured number of
//! threads, and folds the results into a [`DigestIndex`] holding one path
//! per digest.
//!
//! Worker completion order never decides the representative: results are
//! gathered first and inserted in lexicographic path order, so among files
//! sharing a digest the smallest path always wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::{HashCache, Lookup};
use crate::progress::ProgressCallback;
use crate::scanner::{HashError, Walker, WalkerConfig};

/// Digest → representative path for one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestIndex {
    map: HashMap<String, PathBuf>,
}

impl DigestIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` for `digest` unless the digest already has a path.
    ///
    /// Returns `true` if the path became the representative.
    pub fn insert_first(&mut self, digest: String, path: PathBuf) -> bool {
        match self.map.entry(digest) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(path);
                true
            }
        }
    }

    /// Whether any file in the tree has this digest.
    #[must_use]
    pub fn contains(&self, digest: &str) -> bool {
        self.map.contains_key(digest)
    }

    /// Representative path for a digest.
    #[must_use]
    pub fn get(&self, digest: &str) -> Option<&Path> {
        self.map.get(digest).map(PathBuf::as_path)
    }

    /// Number of distinct digests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(digest, path)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.map.iter().map(|(d, p)| (d.as_str(), p.as_path()))
    }

    /// Representative paths, sorted.
    #[must_use]
    pub fn into_paths(self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.map.into_values().collect();
        paths.sort();
        paths
    }
}

/// Statistics from scanning one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Regular files found by the walk
    pub files_seen: usize,
    /// Files skipped by the eligibility predicate
    pub ineligible: usize,
    /// Digests served from the cache
    pub cache_hits: usize,
    /// Digests computed from content
    pub cache_misses: usize,
    /// Files whose hashing failed (logged and skipped)
    pub failed: usize,
    /// Walk errors (unreadable directories, vanished entries)
    pub walk_errors: usize,
    /// Eligible files whose digest was already represented in the tree
    pub duplicates_collapsed: usize,
    /// Whether the scan stopped early on shutdown
    pub interrupted: bool,
}

impl ScanStats {
    /// Files that produced a digest.
    #[must_use]
    pub fn hashed(&self) -> usize {
        self.cache_hits + self.cache_misses
    }
}

/// Configuration for tree scans.
#[derive(Clone, Default)]
pub struct ScanConfig {
    /// Width of the hashing pool.
    pub threads: usize,
    /// Walk options (ignored directory names, symlinks).
    pub walker: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("threads", &self.threads)
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Set the hashing pool width (at least 1).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Run `work` on a rayon pool of the given width.
pub(crate) fn run_bounded<T, F>(threads: usize, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(e) => {
            log::warn!(
                "Failed to create hashing pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            work()
        }
    }
}

/// Hashes every file of a tree through a shared [`HashCache`].
pub struct TreeScanner<'a> {
    cache: &'a HashCache,
    config: ScanConfig,
}

impl<'a> TreeScanner<'a> {
    /// Create a scanner over the shared cache.
    #[must_use]
    pub fn new(cache: &'a HashCache, config: ScanConfig) -> Self {
        Self { cache, config }
    }

    /// Index a tree. A root that does not exist yields an empty index.
    ///
    /// `label` names the phase for progress reporting.
    #[must_use]
    pub fn scan(&self, root: &Path, label: &str) -> (DigestIndex, ScanStats) {
        let mut stats = ScanStats::default();
        if !root.exists() {
            log::info!("{} does not exist, nothing to index", root.display());
            return (DigestIndex::new(), stats);
        }

        let mut walker = Walker::new(root, self.config.walker.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        let mut files = Vec::new();
        for entry in walker.walk() {
            match entry {
                Ok(file) => files.push(file.path),
                Err(_) => stats.walk_errors += 1,
            }
        }
        stats.files_seen = files.len();
        stats.interrupted = self.config.is_shutdown_requested();

        log::info!("Hashing {} files from {}...", files.len(), root.display());
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(label, files.len());
        }

        let done = AtomicUsize::new(0);
        let results: Vec<(PathBuf, Option<Result<Lookup, HashError>>)> =
            run_bounded(self.config.threads, || {
                files
                    .into_par_iter()
                    .map(|path| {
                        if self.config.is_shutdown_requested() {
                            return (path, None);
                        }
                        let outcome = self.cache.lookup(&path);
                        if let Some(ref callback) = self.config.progress_callback {
                            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                            callback.on_progress(current, path.to_string_lossy().as_ref());
                        }
                        (path, Some(outcome))
                    })
                    .collect()
            });

        let mut hashed: Vec<(PathBuf, String)> = Vec::with_capacity(results.len());
        for (path, outcome) in results {
            match outcome {
                None => stats.interrupted = true,
                Some(Ok(Lookup::Ineligible)) => stats.ineligible += 1,
                Some(Ok(Lookup::Cached(digest))) => {
                    stats.cache_hits += 1;
                    hashed.push((path, digest));
                }
                Some(Ok(Lookup::Computed(digest))) => {
                    stats.cache_misses += 1;
                    hashed.push((path, digest));
                }
                Some(Err(e)) => {
                    log::warn!("Error: {} ({})", path.display(), e);
                    stats.failed += 1;
                }
            }
        }

        hashed.sort_by(|a, b| a.0.cmp(&b.0));
        let mut index = DigestIndex::new();
        for (path, digest) in hashed {
            if !index.insert_first(digest, path) {
                stats.duplicates_collapsed += 1;
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(label);
        }
        if stats.interrupted {
            log::info!("Scan of {} interrupted by shutdown signal", root.display());
        }
        log::info!(
            "Indexed {}: {} unique digests from {} files ({} cached, {} hashed, {} skipped, {} errors)",
            root.display(),
            index.len(),
            stats.files_seen,
            stats.cache_hits,
            stats.cache_misses,
            stats.ineligible,
            stats.failed
        );

        (index, stats)
    }
}
