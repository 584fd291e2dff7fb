//! Command-line interface definitions for photosync.
//!
//! Global options control logging and the config file; subcommands select
//! the operation. Without a subcommand a sync run is performed with the
//! configured settings.
//!
//! # Example
//!
//! ```bash
//! # Sync with settings from config file and environment
//! photosync
//!
//! # Preview a copy-mode sync into a flat mirror
//! photosync run --source /mnt/phone --destination /photos --mode copy --flat --dry-run
//!
//! # Number of cached digests
//! photosync status
//!
//! # Effective configuration as TOML
//! photosync config
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::actions::RelocationMode;
use crate::scanner::HashAlgorithm;

/// Content-addressed media library sync.
///
/// photosync hashes a source tree and a destination library, then moves or
/// copies only the files whose content the library does not have yet.
#[derive(Debug, Parser)]
#[command(name = "photosync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// TOML config file (default: platform config dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Append log records to this file as well as stderr
    #[arg(long, value_name = "PATH", global = true, env = "PHOTOSYNC_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync novel files from source into destination
    Run(RunArgs),
    /// Print the number of entries in the hash cache
    Status(StatusArgs),
    /// Print the effective configuration as TOML
    Config(RunArgs),
}

/// Overrides for a sync run. Unset options keep their configured value.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Tree to take files from
    #[arg(long, short = 's', value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Library to place files into
    #[arg(long, short = 'd', value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Hash cache JSON file
    #[arg(long, value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// Digest algorithm
    #[arg(long, value_enum, value_name = "ALGO")]
    pub algorithm: Option<HashAlgorithm>,

    /// Log planned moves without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Move (remove from source) or copy
    #[arg(long, value_enum)]
    pub mode: Option<RelocationMode>,

    /// Mirror source-relative paths instead of {YYYY}/{MM} folders
    #[arg(long)]
    pub flat: bool,

    /// Directory name to skip (repeatable, replaces the configured list)
    #[arg(long = "ignore-dir", value_name = "NAME")]
    pub ignore_dirs: Vec<String>,

    /// Hashing worker threads
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Smallest eligible file (e.g., 30KiB, 1MB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Save the cache after this many fresh digests (0 disables)
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,
}

/// Arguments for the status subcommand.
#[derive(Debug, Default, Args)]
pub struct StatusArgs {
    /// Hash cache JSON file
    #[arg(long, value_name = "PATH")]
    pub cache_file: Option<PathBuf>,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB.
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use photosync::cli::parse_size;
///
/// assert_eq!(parse_size("30KiB").unwrap(), 30 * 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
