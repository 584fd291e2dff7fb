//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`SyncConfig::default`])
//! 2. A TOML file (`--config PATH`, or `photosync/config.toml` in the
//!    platform config directory)
//! 3. Environment variables prefixed `PHOTOSYNC_` (e.g. `PHOTOSYNC_DRY_RUN=true`)
//! 4. Command-line flags ([`SyncConfig::apply_overrides`])
//!
//! The merged value is built once at startup and handed to every component.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::actions::RelocationMode;
use crate::cli::RunArgs;
use crate::scanner::{
    HashAlgorithm, DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_NAMES, DEFAULT_MIN_SIZE,
};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PHOTOSYNC_";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed or a value has the wrong type.
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    /// Values parsed but are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Effective settings for a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tree to sync from.
    pub source: PathBuf,
    /// Library to sync into.
    pub destination: PathBuf,
    /// JSON hash cache location.
    pub cache_file: PathBuf,
    /// Digest algorithm.
    pub hash_algorithm: HashAlgorithm,
    /// Log actions without touching files.
    pub dry_run: bool,
    /// Move or copy novel files.
    pub mode: RelocationMode,
    /// `{YYYY}/{MM}` layout instead of mirroring source paths.
    pub date_structure: bool,
    /// Directory names skipped during walks and pruning, case-insensitive.
    #[serde(deserialize_with = "list_or_csv")]
    pub ignore_dirs: Vec<String>,
    /// Hashing worker threads.
    pub threads: usize,
    /// Smallest eligible file in bytes.
    pub min_size: u64,
    /// Excluded extensions, with or without the leading dot.
    #[serde(deserialize_with = "list_or_csv")]
    pub excluded_extensions: Vec<String>,
    /// Excluded file names, case-insensitive.
    #[serde(deserialize_with = "list_or_csv")]
    pub excluded_names: Vec<String>,
    /// Save the cache after this many fresh digests; 0 disables.
    pub checkpoint_every: usize,
    /// Append log records here as well as stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("/duplicates"),
            destination: PathBuf::from("/sorted"),
            cache_file: default_cache_file(),
            hash_algorithm: HashAlgorithm::default(),
            dry_run: false,
            mode: RelocationMode::default(),
            date_structure: true,
            ignore_dirs: vec!["@eaDir".into(), "tmp".into(), "cache".into()],
            threads: 4,
            min_size: DEFAULT_MIN_SIZE,
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            excluded_names: DEFAULT_EXCLUDED_NAMES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            checkpoint_every: 500,
            log_file: None,
        }
    }
}

/// Accept either a TOML/JSON list or a comma-separated string.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "photosync")
}

/// Platform cache location, or `./hash_cache.json` if there is none.
#[must_use]
pub fn default_cache_file() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("hash_cache.json"))
        .unwrap_or_else(|| PathBuf::from("hash_cache.json"))
}

/// Platform location of the optional config file.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl SyncConfig {
    /// Figment with defaults, the TOML file and the environment merged.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `config_path` does not exist.
    pub fn figment(config_path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(SyncConfig::default()));

        match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = default_config_path() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load defaults, file and environment layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer cannot be read or has bad values.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: SyncConfig = Self::figment(config_path)?
            .extract()
            .map_err(Box::new)?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Apply command-line flags on top of the loaded layers.
    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(ref source) = args.source {
            self.source = source.clone();
        }
        if let Some(ref destination) = args.destination {
            self.destination = destination.clone();
        }
        if let Some(ref cache_file) = args.cache_file {
            self.cache_file = cache_file.clone();
        }
        if let Some(algorithm) = args.algorithm {
            self.hash_algorithm = algorithm;
        }
        if args.dry_run {
            self.dry_run = true;
        }
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        if args.flat {
            self.date_structure = false;
        }
        if !args.ignore_dirs.is_empty() {
            self.ignore_dirs = args.ignore_dirs.clone();
        }
        if let Some(threads) = args.threads {
            self.threads = threads;
        }
        if let Some(min_size) = args.min_size {
            self.min_size = min_size;
        }
        if let Some(n) = args.checkpoint_every {
            self.checkpoint_every = n;
        }
    }

    /// Clamp and check the merged settings.
    ///
    /// Relative source, destination and cache paths are resolved against
    /// the working directory, so cache keys are always absolute.
    ///
    /// # Errors
    ///
    /// Fails if source and destination are the same directory, or if the
    /// working directory cannot be determined for a relative path.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.threads = self.threads.max(1);
        self.source = make_absolute(&self.source)?;
        self.destination = make_absolute(&self.destination)?;
        self.cache_file = make_absolute(&self.cache_file)?;

        if self.source == self.destination {
            return Err(ConfigError::Invalid(format!(
                "source and destination are the same directory: {}",
                self.source.display()
            )));
        }
        if let (Ok(src), Ok(dst)) = (self.source.canonicalize(), self.destination.canonicalize()) {
            if src == dst {
                return Err(ConfigError::Invalid(format!(
                    "source and destination resolve to the same directory: {}",
                    src.display()
                )));
            }
        }
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a path is not valid UTF-8.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn make_absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path)
        .map_err(|e| ConfigError::Invalid(format!("cannot resolve {}: {}", path.display(), e)))
}
