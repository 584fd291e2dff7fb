//! Streaming content hasher with a selectable digest algorithm.
//!
//! # Overview
//!
//! [`Hasher`] streams a file through the active digest function in fixed
//! 64 KiB chunks and returns the digest as a lowercase hex string. The
//! algorithm only changes speed and collision probability; every algorithm
//! produces a plain string key that the cache and the digest index treat
//! identically.
//!
//! The default, [`HashAlgorithm::Xxh64`], renders exactly like the
//! `hexdigest()` of the common xxhash bindings, so cache files written by
//! earlier tools keep matching.
//!
//! # Example
//!
//! ```no_run
//! use photosync::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Blake3);
//! let digest = hasher.hash_file(Path::new("IMG_0001.jpg")).unwrap();
//! println!("{digest}");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use super::{map_hash_io_error, HashError};

/// Size of each read when streaming a file through the digest.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// 32-bit xxHash
    Xxh32,
    /// 64-bit xxHash (default)
    #[default]
    Xxh64,
    /// 64-bit XXH3
    #[serde(alias = "xxh3_64")]
    #[value(alias = "xxh3_64")]
    Xxh3,
    /// 128-bit XXH3
    #[serde(alias = "xxh3_128")]
    #[value(alias = "xxh3_128")]
    Xxh128,
    /// BLAKE3 (cryptographic)
    Blake3,
    /// SHA-256 (cryptographic)
    Sha256,
    /// SHA-512 (cryptographic)
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, in display order.
    pub const ALL: [HashAlgorithm; 7] = [
        Self::Xxh32,
        Self::Xxh64,
        Self::Xxh3,
        Self::Xxh128,
        Self::Blake3,
        Self::Sha256,
        Self::Sha512,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Xxh32 => "xxh32",
            Self::Xxh64 => "xxh64",
            Self::Xxh3 => "xxh3",
            Self::Xxh128 => "xxh128",
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest this algorithm produces.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Xxh32 => 8,
            Self::Xxh64 | Self::Xxh3 => 16,
            Self::Xxh128 => 32,
            Self::Blake3 | Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Whether the algorithm is a cryptographic digest.
    #[must_use]
    pub fn is_cryptographic(self) -> bool {
        matches!(self, Self::Blake3 | Self::Sha256 | Self::Sha512)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm '{0}' (expected one of: xxh32, xxh64, xxh3, xxh128, blake3, sha256, sha512)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xxh32" => Ok(Self::Xxh32),
            "xxh64" => Ok(Self::Xxh64),
            "xxh3" | "xxh3_64" => Ok(Self::Xxh3),
            "xxh128" | "xxh3_128" => Ok(Self::Xxh128),
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// In-progress digest for one of the supported algorithms.
enum DigestState {
    Xxh32(xxhash_rust::xxh32::Xxh32),
    Xxh64(xxhash_rust::xxh64::Xxh64),
    Xxh3(Box<xxhash_rust::xxh3::Xxh3>),
    Xxh128(Box<xxhash_rust::xxh3::Xxh3>),
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Xxh32 => Self::Xxh32(xxhash_rust::xxh32::Xxh32::new(0)),
            HashAlgorithm::Xxh64 => Self::Xxh64(xxhash_rust::xxh64::Xxh64::new(0)),
            HashAlgorithm::Xxh3 => Self::Xxh3(Box::new(xxhash_rust::xxh3::Xxh3::new())),
            HashAlgorithm::Xxh128 => Self::Xxh128(Box::new(xxhash_rust::xxh3::Xxh3::new())),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Xxh32(h) => h.update(data),
            Self::Xxh64(h) => h.update(data),
            Self::Xxh3(h) | Self::Xxh128(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Xxh32(h) => format!("{:08x}", h.digest()),
            Self::Xxh64(h) => format!("{:016x}", h.digest()),
            Self::Xxh3(h) => format!("{:016x}", h.digest()),
            Self::Xxh128(h) => format!("{:032x}", h.digest128()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Streaming file hasher.
///
/// Cheap to copy; every call starts a fresh digest, so one `Hasher` can be
/// shared by all worker threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hasher {
    algorithm: HashAlgorithm,
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The active algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash an in-memory buffer.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finalize_hex()
    }

    /// Stream a reader through the digest in [`CHUNK_SIZE`] chunks.
    ///
    /// # Errors
    ///
    /// Returns the first read error other than `Interrupted`.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<String> {
        let mut state = DigestState::new(self.algorithm);
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => state.update(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(state.finalize_hex())
    }

    /// Hash the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| map_hash_io_error(path, e))?;
        self.hash_reader(file)
            .map_err(|e| map_hash_io_error(path, e))
    }
}
