//! Relocation of novel files into the destination tree.
//!
//! # Overview
//!
//! For every novel file the [`Placer`]:
//! 1. computes a candidate path, either `{dest}/{YYYY}/{MM}/{name}` from the
//!    file's modification time or `{dest}/{path relative to source}`,
//! 2. appends `_1`, `_2`, … before the extension until the name is free,
//! 3. moves or copies the file there, or only logs the action in a dry run.
//!
//! Per-file failures are logged and collected; a batch never aborts early
//! except on shutdown.
//!
//! # Example
//!
//! ```no_run
//! use photosync::actions::{Layout, Placer, PlacerConfig, RelocationMode};
//! use std::path::PathBuf;
//!
//! let mut placer = Placer::new(PlacerConfig {
//!     source_root: PathBuf::from("/duplicates"),
//!     destination_root: PathBuf::from("/sorted"),
//!     layout: Layout::Date,
//!     mode: RelocationMode::Move,
//!     dry_run: true,
//! });
//! let result = placer.place_all(&[PathBuf::from("/duplicates/IMG_0001.jpg")]);
//! println!("{}", result.summary());
//! ```

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::ProgressCallback;

/// Whether relocation removes the source file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RelocationMode {
    /// Remove the file from the source tree.
    #[default]
    Move,
    /// Leave the source file in place.
    Copy,
}

/// How destination paths are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `{dest}/{year}/{month}/{basename}` from the modification time.
    #[default]
    Date,
    /// `{dest}/{path relative to the source root}`.
    Mirror,
}

impl Layout {
    /// Layout for the date-structure flag.
    #[must_use]
    pub fn from_date_structure(date_structure: bool) -> Self {
        if date_structure {
            Self::Date
        } else {
            Self::Mirror
        }
    }
}

/// What happened to a placed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceAction {
    /// Moved out of the source tree.
    Moved,
    /// Copied, source retained.
    Copied,
    /// Dry run: logged only.
    Simulated,
}

/// A successful (or simulated) relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Original path.
    pub source: PathBuf,
    /// Final, collision-free destination.
    pub destination: PathBuf,
    /// Action taken.
    pub action: PlaceAction,
}

/// Error type for relocation.
#[derive(Debug, Error)]
pub enum PlaceError {
    /// Source vanished before it could be placed.
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),

    /// Source metadata could not be read.
    #[error("cannot stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file has no name component to place.
    #[error("no file name: {0}")]
    NoFileName(PathBuf),

    /// Destination directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The probed free name was taken before the copy started.
    #[error("destination appeared concurrently: {0}")]
    DestinationTaken(PathBuf),

    /// Move or copy failed.
    #[error("failed to relocate {from} → {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Results of a batch placement.
#[derive(Debug, Clone, Default)]
pub struct BatchPlaceResult {
    /// Successful or simulated placements, in input order.
    pub placements: Vec<Placement>,
    /// Failed placements with their errors.
    pub failures: Vec<(PathBuf, String)>,
    /// Whether the batch stopped early on shutdown.
    pub interrupted: bool,
}

impl BatchPlaceResult {
    /// Number of successful placements.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of failed placements.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of attempted placements.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.placements.len() + self.failures.len()
    }

    /// Check if all placements succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Placed {} file(s)", self.success_count())
        } else {
            format!(
                "Placed {} file(s), {} failed",
                self.success_count(),
                self.failure_count()
            )
        }
    }
}

/// Configuration for placement.
#[derive(Debug, Clone)]
pub struct PlacerConfig {
    /// Root of the tree files come from.
    pub source_root: PathBuf,
    /// Root of the library files go to.
    pub destination_root: PathBuf,
    /// Destination path layout.
    pub layout: Layout,
    /// Move or copy.
    pub mode: RelocationMode,
    /// Log actions without touching the filesystem.
    pub dry_run: bool,
}

/// `YYYY/MM` folder for a modification time, in local time.
#[must_use]
pub fn date_folder(modified: SystemTime) -> PathBuf {
    let local: DateTime<Local> = modified.into();
    PathBuf::from(format!("{:04}", local.year())).join(format!("{:02}", local.month()))
}

/// First free variant of `candidate`: the path itself, then
/// `{stem}_1{.ext}`, `{stem}_2{.ext}`, …
pub fn resolve_collision(candidate: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(candidate) {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));
    let stem = candidate.file_stem().unwrap_or_default();
    let extension = candidate.extension();

    let mut i: u64 = 1;
    loop {
        let mut name = OsString::from(stem);
        name.push(format!("_{i}"));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }
        let next = parent.join(name);
        if !is_taken(&next) {
            return next;
        }
        i += 1;
    }
}

/// Relocates novel files one at a time, in input order.
pub struct Placer {
    config: PlacerConfig,
    reserved: HashSet<PathBuf>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Placer {
    /// Create a placer.
    #[must_use]
    pub fn new(config: PlacerConfig) -> Self {
        Self {
            config,
            reserved: HashSet::new(),
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

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn stat_source(path: &Path) -> Result<fs::Metadata, PlaceError> {
        fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PlaceError::SourceMissing(path.to_path_buf()),
            _ => PlaceError::Metadata {
                path: path.to_path_buf(),
                source: e,
            },
        })
    }

    /// Candidate destination before collision resolution.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be stat'ed (date layout) or has no name.
    pub fn plan_destination(&self, path: &Path) -> Result<PathBuf, PlaceError> {
        match self.config.layout {
            Layout::Date => {
                let metadata = Self::stat_source(path)?;
                self.date_destination(path, &metadata)
            }
            Layout::Mirror => self.mirror_destination(path),
        }
    }

    fn date_destination(&self, path: &Path, metadata: &fs::Metadata) -> Result<PathBuf, PlaceError> {
        let name = path
            .file_name()
            .ok_or_else(|| PlaceError::NoFileName(path.to_path_buf()))?;
        let modified = metadata.modified().map_err(|e| PlaceError::Metadata {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(self
            .config
            .destination_root
            .join(date_folder(modified))
            .join(name))
    }

    fn mirror_destination(&self, path: &Path) -> Result<PathBuf, PlaceError> {
        match path.strip_prefix(&self.config.source_root) {
            Ok(relative) if !relative.as_os_str().is_empty() => {
                Ok(self.config.destination_root.join(relative))
            }
            _ => {
                // Not under the source root: keep only the name
                let name = path
                    .file_name()
                    .ok_or_else(|| PlaceError::NoFileName(path.to_path_buf()))?;
                Ok(self.config.destination_root.join(name))
            }
        }
    }

    /// Place a single file.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError`] if the file cannot be relocated; nothing is
    /// retried.
    pub fn place(&mut self, path: &Path) -> Result<Placement, PlaceError> {
        let metadata = Self::stat_source(path)?;
        let candidate = match self.config.layout {
            Layout::Date => self.date_destination(path, &metadata)?,
            Layout::Mirror => self.mirror_destination(path)?,
        };
        let reserved = &self.reserved;
        let destination =
            resolve_collision(&candidate, |p| path_occupied(p) || reserved.contains(p));

        if self.config.dry_run {
            log::info!("[DRY] {} → {}", path.display(), destination.display());
            self.reserved.insert(destination.clone());
            return Ok(Placement {
                source: path.to_path_buf(),
                destination,
                action: PlaceAction::Simulated,
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| PlaceError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let action = match self.config.mode {
            RelocationMode::Move => {
                move_file(path, &destination, &metadata)?;
                PlaceAction::Moved
            }
            RelocationMode::Copy => {
                copy_file(path, &destination, &metadata)?;
                PlaceAction::Copied
            }
        };
        log::info!("{} → {}", path.display(), destination.display());
        self.reserved.insert(destination.clone());

        Ok(Placement {
            source: path.to_path_buf(),
            destination,
            action,
        })
    }

    /// Place every file, continuing past failures.
    pub fn place_all(&mut self, paths: &[PathBuf]) -> BatchPlaceResult {
        let mut result = BatchPlaceResult::default();
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("relocate", paths.len());
        }

        for (i, path) in paths.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!("Placement interrupted, {} file(s) left", paths.len() - i);
                result.interrupted = true;
                break;
            }
            match self.place(path) {
                Ok(placement) => result.placements.push(placement),
                Err(e) => {
                    log::warn!("Error: {}", e);
                    result.failures.push((path.clone(), e.to_string()));
                }
            }
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(i + 1, path.to_string_lossy().as_ref());
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("relocate");
        }
        result
    }
}

fn relocate_error(from: &Path, to: &Path, source: io::Error) -> PlaceError {
    PlaceError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

/// True if anything, including a dangling symlink, occupies `path`.
fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Claim `dest` with a hard link, then drop the source entry.
///
/// Linking fails on an occupied name, so a destination taken after the
/// probe is reported instead of overwritten. Where links are unavailable
/// (another filesystem, no link support) the file is copied and removed.
fn move_file(source: &Path, dest: &Path, metadata: &fs::Metadata) -> Result<(), PlaceError> {
    match fs::hard_link(source, dest) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(dest);
                return Err(relocate_error(source, dest, e));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(PlaceError::DestinationTaken(dest.to_path_buf()))
        }
        Err(e) => {
            log::debug!(
                "link {} failed ({}), falling back to copy",
                source.display(),
                e
            );
            copy_file(source, dest, metadata)?;
            fs::remove_file(source).map_err(|e| relocate_error(source, dest, e))
        }
    }
}

/// Copy without overwriting, carrying permissions and modification time.
fn copy_file(source: &Path, dest: &Path, metadata: &fs::Metadata) -> Result<(), PlaceError> {
    let mut reader = File::open(source).map_err(|e| relocate_error(source, dest, e))?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => PlaceError::DestinationTaken(dest.to_path_buf()),
            _ => relocate_error(source, dest, e),
        })?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(e) = copied {
        let _ = fs::remove_file(dest);
        return Err(relocate_error(source, dest, e));
    }

    if let Err(e) = fs::set_permissions(dest, metadata.permissions()) {
        log::debug!("Could not copy permissions to {}: {}", dest.display(), e);
    }
    filetime::set_file_mtime(dest, FileTime::from_last_modification_time(metadata))
        .map_err(|e| relocate_error(source, dest, e))
}
