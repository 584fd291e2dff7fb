//! Removal of directories left empty after a move.
//!
//! Directories are processed deepest first so that a chain of nested empty
//! directories collapses in a single pass. The root itself is never removed,
//! and directories named in the ignore list are left untouched along with
//! everything beneath them.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::scanner::ignore_set;

/// Outcome of a prune pass.
#[derive(Debug, Clone, Default)]
pub struct PruneResult {
    /// Directories removed, deepest first.
    pub removed: Vec<PathBuf>,
    /// Empty directories that could not be removed.
    pub failed: Vec<(PathBuf, String)>,
}

impl PruneResult {
    /// Number of directories removed.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn is_ignored(entry: &walkdir::DirEntry, ignored: &HashSet<String>) -> bool {
    ignored.contains(&entry.file_name().to_string_lossy().to_lowercase())
}

/// Every directory below `root` with its depth, pre-order, ignored subtrees skipped.
fn collect_dirs(root: &Path, ignored: &HashSet<String>) -> Vec<(usize, PathBuf)> {
    let mut dirs = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping during prune: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if is_ignored(&entry, ignored) {
            walker.skip_current_dir();
            continue;
        }
        dirs.push((entry.depth(), entry.into_path()));
    }
    dirs
}

/// Remove every empty directory strictly below `root`.
///
/// Errors are logged at debug level and never abort the pass. A missing
/// root yields an empty result.
pub fn prune_empty_dirs(root: &Path, ignore_dirs: &[String]) -> PruneResult {
    let mut result = PruneResult::default();
    if !root.is_dir() {
        return result;
    }

    let ignored = ignore_set(ignore_dirs);
    let mut dirs = collect_dirs(root, &ignored);
    dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    for (_, dir) in &dirs {
        let path = dir.as_path();
        match is_empty_dir(path) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log::debug!("Cannot read {}: {}", path.display(), e);
                continue;
            }
        }

        match fs::remove_dir(path) {
            Ok(()) => {
                log::debug!("Removed empty directory {}", path.display());
                result.removed.push(path.to_path_buf());
            }
            Err(e) => {
                log::debug!("Failed to remove {}: {}", path.display(), e);
                result.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    result
}
