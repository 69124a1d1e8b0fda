//==================================================
// File: error.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Error taxonomy for the autoloader
// Objective: Typed, non-fatal failures for configuration and cache persistence
//==================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems with a configured base path or the configuration file itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base path '{}' does not exist", .0.display())]
    MissingBasePath(PathBuf),
    #[error("base path '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to resolve base path '{}': {error}", .path.display())]
    Unresolvable { path: PathBuf, error: io::Error },
    #[error("identifier separator must be a single non-path character, got {0:?}")]
    InvalidSeparator(String),
    #[error("file extension {0:?} must not contain path separators")]
    InvalidExtension(String),
}

/// Failures of a [`crate::store::PersistentBindingStore`].
///
/// The resolver never propagates these; they are logged and treated as an
/// absent snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store io error at '{}': {error}", .path.display())]
    Io { path: PathBuf, error: io::Error },
    #[error("cache snapshot encoding failed: {0}")]
    Encode(String),
    #[error("cache snapshot decoding failed: {0}")]
    Decode(String),
    #[error("cache snapshot has an invalid header")]
    InvalidHeader,
    #[error("unsupported cache snapshot format version {0}")]
    UnsupportedVersion(u16),
    #[error("no cache directory available")]
    NoCacheDir,
}

pub type StoreResult<T> = Result<T, StoreError>;
