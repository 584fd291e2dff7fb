//! Hash caching module for photosync.
//!
//! This module provides persistent storage for file digests so that later
//! runs do not re-read unchanged files.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`store`]: The shared concurrent map, JSON persistence and the
//!   get-or-compute entry point used by every hashing worker.
//! * [`entry`]: The data stored per path and its freshness check.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by absolute path and validated using:
//! * File size
//! * Modification time (whole seconds)
//!
//! If either changes, the entry is stale and the file is re-hashed. Content
//! rewritten in place without changing either is served from the cache.
//!
//! # File Format
//!
//! A single JSON object mapping path strings to
//! `{"size": u64, "mtime": i64, "hash": string}`. A missing, empty or
//! corrupt file is treated as an empty cache by [`HashCache::load`];
//! [`HashCache::try_load`] reports which of those happened.

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::{CacheError, CacheResult, HashCache, Lookup};
