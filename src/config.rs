//! Analysis configuration.
//!
//! Loaded from an optional `depwatch.toml` in the project root. Every field has
//! a default, so an empty or missing file yields [`Config::default`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::incremental::cache::DEFAULT_MAX_SNAPSHOTS;

pub const CONFIG_FILE_NAME: &str = "depwatch.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub incremental: IncrementalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Globs selecting candidate files, relative to the project root.
    pub include: Vec<String>,
    /// Globs removing files from the candidate set. Exclusion wins.
    pub exclude: Vec<String>,
    /// Extra roots searched for absolute imports after the project root.
    pub search_roots: Vec<PathBuf>,
    /// Extension (without the dot) of source files.
    pub source_extension: String,
    /// Worker count for file processing. Zero uses the rayon default.
    pub threads: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.py".to_string()],
            exclude: vec![
                "**/venv/**".to_string(),
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
            search_roots: Vec::new(),
            source_extension: "py".to_string(),
            threads: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncrementalConfig {
    pub cache_dir: PathBuf,
    /// Snapshots kept per analysis kind.
    pub max_snapshots: usize,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".depwatch_cache"),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

impl IncrementalConfig {
    /// Cache directory, resolved against `root` when relative.
    pub fn cache_dir_in(&self, root: &Path) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            root.join(&self.cache_dir)
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Load `depwatch.toml` from `root` if it exists, otherwise the defaults.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading configuration");
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
