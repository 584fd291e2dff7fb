//! Cross-tree novelty detection.
//!
//! # Overview
//!
//! The [`Deduplicator`] indexes the destination tree first and the source
//! tree second, both through the same [`HashCache`], then keeps the source
//! representatives whose digest the destination does not contain. Because
//! the destination is always fully indexed before any source file is judged,
//! content already present in the library is never relocated again.
//!
//! # Example
//!
//! ```no_run
//! use photosync::cache::HashCache;
//! use photosync::duplicates::{Deduplicator, ScanConfig};
//! use photosync::scanner::{Eligibility, Hasher};
//! use std::path::Path;
//!
//! let cache = HashCache::load("hash_cache.json", Hasher::default(), Eligibility::default());
//! let finder = Deduplicator::new(&cache, ScanConfig::default().with_threads(4));
//! let novel = finder.find_novel(Path::new("/duplicates"), Path::new("/sorted"));
//! println!("{} new files", novel.files.len());
//! ```

use std::path::{Path, PathBuf};

use super::index::{DigestIndex, ScanConfig, ScanStats, TreeScanner};
use crate::cache::HashCache;

/// Result of comparing a source tree against a destination tree.
#[derive(Debug, Clone, Default)]
pub struct NovelFiles {
    /// Source files whose content is absent from the destination, sorted.
    pub files: Vec<PathBuf>,
    /// Scan statistics for the destination tree
    pub destination: ScanStats,
    /// Scan statistics for the source tree
    pub source: ScanStats,
    /// Distinct digests in the destination
    pub destination_digests: usize,
    /// Distinct digests in the source
    pub source_digests: usize,
}

impl NovelFiles {
    /// Whether either scan stopped early.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.destination.interrupted || self.source.interrupted
    }
}

/// Source representatives whose digest is missing from the destination.
#[must_use]
pub fn novel_paths(source: DigestIndex, destination: &DigestIndex) -> Vec<PathBuf> {
    let mut novel: Vec<PathBuf> = source
        .iter()
        .filter(|(digest, _)| !destination.contains(digest))
        .map(|(_, path)| path.to_path_buf())
        .collect();
    novel.sort();
    novel
}

/// Orchestrates the two tree scans and the digest set difference.
pub struct Deduplicator<'a> {
    scanner: TreeScanner<'a>,
}

impl<'a> Deduplicator<'a> {
    /// Create a deduplicator sharing one cache across both scans.
    #[must_use]
    pub fn new(cache: &'a HashCache, config: ScanConfig) -> Self {
        Self {
            scanner: TreeScanner::new(cache, config),
        }
    }

    /// Index `destination`, then `source`, and return the novel source files.
    #[must_use]
    pub fn find_novel(&self, source: &Path, destination: &Path) -> NovelFiles {
        let (destination_index, destination_stats) = self.scanner.scan(destination, "destination");
        let (source_index, source_stats) = self.scanner.scan(source, "source");

        log::info!(
            "Eligible files: {} in destination, {} in source",
            destination_stats.hashed(),
            source_stats.hashed()
        );

        let destination_digests = destination_index.len();
        let source_digests = source_index.len();
        let files = novel_paths(source_index, &destination_index);
        log::info!("Found {} new files", files.len());

        NovelFiles {
            files,
            destination: destination_stats,
            source: source_stats,
            destination_digests,
            source_digests,
        }
    }
}
