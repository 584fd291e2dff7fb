//! One end-to-end sync run.
//!
//! The [`Synchronizer`] wires the pieces together in order:
//!
//! 1. load the hash cache,
//! 2. index the destination, then the source, and take the digest difference,
//! 3. place every novel file,
//! 4. save the cache,
//! 5. prune empty source directories (real, uninterrupted runs only),
//! 6. log the summary line.
//!
//! Nothing inside a run is fatal: per-file failures are logged and counted
//! in the [`SyncSummary`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use crate::actions::{
    prune_empty_dirs, BatchPlaceResult, Layout, PlaceAction, Placer, PlacerConfig,
};
use crate::cache::HashCache;
use crate::config::SyncConfig;
use crate::duplicates::{Deduplicator, ScanConfig, ScanStats};
use crate::progress::ProgressCallback;
use crate::scanner::{Eligibility, Hasher, WalkerConfig};

/// Outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// Source files whose content the destination lacked.
    pub novel: usize,
    /// Files moved, copied or (in a dry run) simulated.
    pub relocated: usize,
    /// Files whose relocation failed.
    pub failed: usize,
    /// Bytes in the relocated files.
    pub relocated_bytes: u64,
    /// Empty source directories removed.
    pub pruned_dirs: usize,
    /// Destination scan statistics.
    pub destination: ScanStats,
    /// Source scan statistics.
    pub source: ScanStats,
    /// Entries in the cache at save time.
    pub cache_entries: usize,
    /// Whether the cache was written successfully.
    pub cache_saved: bool,
    /// Wall time of the run.
    pub duration: Duration,
    /// Whether Ctrl+C cut the run short.
    pub interrupted: bool,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Runs a sync with a fixed configuration.
pub struct Synchronizer {
    config: SyncConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Synchronizer {
    /// Create a synchronizer for `config`.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
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

    /// The configuration this run uses.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn log_banner(&self) {
        let config = &self.config;
        log::info!(
            "===== Sync started {} | DRY_RUN={} =====",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            config.dry_run
        );
        log::info!(
            "{} → {} (mode: {:?}, layout: {}, algorithm: {} ({}), threads: {})",
            config.source.display(),
            config.destination.display(),
            config.mode,
            if config.date_structure { "date" } else { "mirror" },
            config.hash_algorithm,
            if config.hash_algorithm.is_cryptographic() {
                "cryptographic"
            } else {
                "non-cryptographic"
            },
            config.threads
        );
    }

    fn eligibility(&self) -> Eligibility {
        Eligibility::new(
            self.config.min_size,
            self.config.excluded_extensions.iter().cloned(),
            self.config.excluded_names.iter().cloned(),
        )
    }

    fn scan_config(&self) -> ScanConfig {
        let mut scan = ScanConfig::default()
            .with_threads(self.config.threads)
            .with_walker_config(
                WalkerConfig::default().with_ignore_dirs(self.config.ignore_dirs.clone()),
            );
        if let Some(ref flag) = self.shutdown_flag {
            scan = scan.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            scan = scan.with_progress_callback(Arc::clone(callback));
        }
        scan
    }

    fn placer(&self) -> Placer {
        let mut placer = Placer::new(PlacerConfig {
            source_root: self.config.source.clone(),
            destination_root: self.config.destination.clone(),
            layout: Layout::from_date_structure(self.config.date_structure),
            mode: self.config.mode,
            dry_run: self.config.dry_run,
        });
        if let Some(ref flag) = self.shutdown_flag {
            placer = placer.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            placer = placer.with_progress_callback(Arc::clone(callback));
        }
        placer
    }

    /// Execute the run.
    pub fn run(&self) -> SyncSummary {
        let started = Instant::now();
        self.log_banner();

        let cache = HashCache::load(
            &self.config.cache_file,
            Hasher::new(self.config.hash_algorithm),
            self.eligibility(),
        )
        .with_checkpoint_every(self.config.checkpoint_every);
        log::debug!(
            "Cache {} holds {} entries",
            cache.path().display(),
            cache.len()
        );

        let novel = Deduplicator::new(&cache, self.scan_config())
            .find_novel(&self.config.source, &self.config.destination);

        let placed = if novel.interrupted() || self.is_shutdown_requested() {
            BatchPlaceResult {
                interrupted: true,
                ..BatchPlaceResult::default()
            }
        } else {
            self.placer().place_all(&novel.files)
        };

        let cache_saved = cache.save_or_log();
        let interrupted = novel.interrupted() || placed.interrupted;

        let pruned_dirs = if self.config.dry_run || interrupted {
            0
        } else {
            let pruned = prune_empty_dirs(&self.config.source, &self.config.ignore_dirs);
            if pruned.removed_count() > 0 {
                log::info!("Removed {} empty directories", pruned.removed_count());
            }
            pruned.removed_count()
        };

        // A dry run leaves every file at its source path
        let relocated_bytes = placed
            .placements
            .iter()
            .map(|p| match p.action {
                PlaceAction::Simulated => &p.source,
                PlaceAction::Moved | PlaceAction::Copied => &p.destination,
            })
            .filter_map(|path| std::fs::metadata(path).ok())
            .map(|m| m.len())
            .sum();

        let summary = SyncSummary {
            novel: novel.files.len(),
            relocated: placed.success_count(),
            failed: placed.failure_count(),
            relocated_bytes,
            pruned_dirs,
            destination: novel.destination,
            source: novel.source,
            cache_entries: cache.len(),
            cache_saved,
            duration: started.elapsed(),
            interrupted,
            dry_run: self.config.dry_run,
        };

        if summary.interrupted {
            log::warn!("Run interrupted; cache saved, empty directories left in place");
        }
        if summary.failed > 0 {
            log::warn!("{} file(s) could not be relocated", summary.failed);
        }
        log::info!(
            "Done! {}/{} ({}) in {:.1}s",
            summary.relocated,
            summary.novel,
            ByteSize::b(summary.relocated_bytes),
            summary.duration.as_secs_f64()
        );
        summary
    }
}
