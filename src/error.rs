//! Error types for extraction, resolution, change detection and caching.
//!
//! Only [`Error::RootNotFound`] is fatal for an extraction run. The other
//! per-file errors are recorded against the file and the run continues.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(#[from] globset::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("graph document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem failure while probing candidates for one import.
///
/// A candidate that simply does not exist is not an error.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("relative import '{module}' has no source file context")]
    MissingSourceFile { module: String },

    #[error("failed to stat {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The import extractor could not produce an import list for a file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load grammar: {0}")]
    Language(String),

    #[error("failed to parse {}", .0.display())]
    Parse(PathBuf),
}

#[derive(Debug, Error)]
pub enum ChangeDetectionError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected git output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode cache entry: {0}")]
    Decode(#[source] bincode::Error),
}
