//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk, skipping ignored directories
//! - Content hashing with a selectable digest algorithm
//! - The eligibility predicate deciding which files are ever hashed
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Streaming file hashing
//!
//! # Example
//!
//! ```no_run
//! use photosync::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     ignore_dirs: vec!["@eaDir".to_string()],
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/photos"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// Re-export main types
pub use hasher::{HashAlgorithm, Hasher, UnknownAlgorithm, CHUNK_SIZE};
pub use walker::Walker;

/// Files smaller than this are never hashed, cached or moved.
pub const DEFAULT_MIN_SIZE: u64 = 30 * 1024;

/// Sidecar, metadata and log extensions that are never considered media.
pub const DEFAULT_EXCLUDED_EXTENSIONS: [&str; 7] =
    [".tmp", ".db", ".ini", ".aae", ".json", ".txt", ".log"];

/// File names (lowercase) that are never considered media.
pub const DEFAULT_EXCLUDED_NAMES: [&str; 2] = ["thumbs.db", ".nomedia"];

/// Metadata for a discovered file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Directory names that are never descended into (case-insensitive).
    pub ignore_dirs: Vec<String>,
}

impl WalkerConfig {
    /// Create a walker configuration that skips the given directory names.
    #[must_use]
    pub fn with_ignore_dirs(mut self, dirs: Vec<String>) -> Self {
        self.ignore_dirs = dirs;
        self
    }

    /// Lowercased ignore set, as consulted during the walk.
    #[must_use]
    pub fn ignore_set(&self) -> HashSet<String> {
        ignore_set(&self.ignore_dirs)
    }
}

/// Build the lowercase lookup set for a list of ignored directory names.
#[must_use]
pub fn ignore_set(dirs: &[String]) -> HashSet<String> {
    dirs.iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// The hash-eligibility predicate.
///
/// A file is eligible iff its size is at least `min_size`, its lowercase
/// basename is not an excluded name, and its lowercase name does not end in
/// an excluded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    min_size: u64,
    excluded_extensions: Vec<String>,
    excluded_names: HashSet<String>,
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::new(
            DEFAULT_MIN_SIZE,
            DEFAULT_EXCLUDED_EXTENSIONS.iter().map(|s| (*s).to_string()),
            DEFAULT_EXCLUDED_NAMES.iter().map(|s| (*s).to_string()),
        )
    }
}

impl Eligibility {
    /// Build a predicate from explicit rules. Extensions may be given with
    /// or without the leading dot.
    #[must_use]
    pub fn new(
        min_size: u64,
        excluded_extensions: impl IntoIterator<Item = String>,
        excluded_names: impl IntoIterator<Item = String>,
    ) -> Self {
        let excluded_extensions = excluded_extensions
            .into_iter()
            .map(|e| {
                let e = e.trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .filter(|e| e.len() > 1)
            .collect();
        let excluded_names = excluded_names
            .into_iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            min_size,
            excluded_extensions,
            excluded_names,
        }
    }

    /// Minimum eligible size in bytes.
    #[must_use]
    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    /// Whether the path is excluded by name or extension, regardless of size.
    #[must_use]
    pub fn is_excluded_name(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_lowercase(),
            None => return true,
        };
        self.excluded_names.contains(&name)
            || self
                .excluded_extensions
                .iter()
                .any(|ext| name.ends_with(ext.as_str()))
    }

    /// Full predicate: size threshold plus name/extension exclusions.
    #[must_use]
    pub fn is_eligible(&self, path: &Path, size: u64) -> bool {
        size >= self.min_size && !self.is_excluded_name(path)
    }
}

/// Modification time as whole seconds since the Unix epoch.
#[must_use]
pub fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Io { path: p, .. } => p,
        }
    }
}

pub(crate) fn map_hash_io_error(path: &Path, error: io::Error) -> HashError {
    match error.kind() {
        io::ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => HashError::PermissionDenied(path.to_path_buf()),
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}
