//! File actions module.
//!
//! This module provides functionality for:
//! - Relocating novel files into the destination library ([`place`])
//! - Removing source directories left empty afterwards ([`prune`])
//!
//! # Placement
//!
//! Files land in `{dest}/{YYYY}/{MM}/{name}` by modification time, or at
//! their source-relative path when the date structure is off. Taken names
//! get a numeric suffix before the extension.
//!
//! ```no_run
//! use photosync::actions::resolve_collision;
//! use std::path::Path;
//!
//! let free = resolve_collision(Path::new("/sorted/2023/01/a.jpg"), |p| p.exists());
//! println!("{}", free.display());
//! ```
//!
//! # Pruning
//!
//! ```no_run
//! use photosync::actions::prune_empty_dirs;
//! use std::path::Path;
//!
//! let result = prune_empty_dirs(Path::new("/duplicates"), &["@eaDir".to_string()]);
//! println!("removed {} directories", result.removed_count());
//! ```

pub mod place;
pub mod prune;

pub use place::{
    date_folder, resolve_collision, BatchPlaceResult, Layout, PlaceAction, PlaceError, Placement,
    Placer, PlacerConfig, RelocationMode,
};
pub use prune::{prune_empty_dirs, PruneResult};
