//! Content-addressed deduplication.
//!
//! This module provides functionality for:
//! - Indexing a tree as digest → first path ([`index`])
//! - Comparing a source tree against a destination tree ([`finder`])

pub mod finder;
pub mod index;

pub use finder::{novel_paths, Deduplicator, NovelFiles};
pub use index::{DigestIndex, ScanConfig, ScanStats, TreeScanner};
