//! photosync - content-addressed media library sync.
//!
//! Hashes a source tree and a destination library, then moves or copies
//! only the files whose content the library lacks, into `{YYYY}/{MM}`
//! folders or a mirror of the source layout. Digests are cached on disk by
//! path, size and modification time so later runs only read new files.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod sync;

use std::sync::Arc;

use anyhow::Context;

use crate::cache::HashCache;
use crate::cli::{Cli, Commands};
use crate::config::SyncConfig;
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::sync::Synchronizer;

/// Merge config file, environment and global CLI flags.
///
/// # Errors
///
/// Fails if a configuration layer cannot be read.
pub fn load_config(cli: &Cli) -> Result<SyncConfig, config::ConfigError> {
    let mut config = SyncConfig::load(cli.config.as_deref())?;
    if let Some(ref log_file) = cli.log_file {
        config.log_file = Some(log_file.clone());
    }
    Ok(config)
}

/// Run the application with parsed arguments.
///
/// Logging must already be initialized.
///
/// # Errors
///
/// Fails on invalid configuration or if the Ctrl+C handler cannot be
/// installed. Per-file problems during a run never surface here.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = load_config(&cli)?;

    match cli.command {
        None => run_sync(config, cli.quiet),
        Some(Commands::Run(ref args)) => {
            config.apply_overrides(args);
            run_sync(config, cli.quiet)
        }
        Some(Commands::Status(ref args)) => {
            if let Some(ref cache_file) = args.cache_file {
                config.cache_file = cache_file.clone();
            }
            let count = match HashCache::count_entries(&config.cache_file) {
                Ok(count) => count,
                Err(e) => {
                    log::debug!("Cache unavailable ({}): {}", e.reason(), e);
                    0
                }
            };
            println!("{count}");
            Ok(ExitCode::Success)
        }
        Some(Commands::Config(ref args)) => {
            config.apply_overrides(args);
            config.validate()?;
            let rendered = config
                .to_toml()
                .context("Failed to render configuration")?;
            print!("{rendered}");
            Ok(ExitCode::Success)
        }
    }
}

fn run_sync(mut config: SyncConfig, quiet: bool) -> anyhow::Result<ExitCode> {
    config.validate()?;

    let handler = signal::install_handler()?;
    let summary = Synchronizer::new(config)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(quiet)))
        .run();

    if summary.interrupted || handler.is_shutdown_requested() {
        Ok(ExitCode::Interrupted)
    } else {
        Ok(ExitCode::Success)
    }
}
