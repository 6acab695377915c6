pub mod common;
pub mod metrics;
pub mod python;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExtractionError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    #[default]
    Absolute,
    Relative,
}

/// One import as written in a source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub kind: ImportKind,
    /// Dotted module path without leading dots. Empty for `from . import x`.
    pub module_path: String,
    /// Number of leading dots. Zero for absolute imports.
    pub relative_level: usize,
    pub line: usize,
    /// Names bound by `from module import a, b`. Empty for `import module`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

impl ImportDescriptor {
    pub fn absolute(module_path: impl Into<String>, line: usize) -> Self {
        Self {
            kind: ImportKind::Absolute,
            module_path: module_path.into(),
            relative_level: 0,
            line,
            names: Vec::new(),
        }
    }

    pub fn relative(module_path: impl Into<String>, relative_level: usize, line: usize) -> Self {
        Self {
            kind: ImportKind::Relative,
            module_path: module_path.into(),
            relative_level,
            line,
            names: Vec::new(),
        }
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Produces the ordered import list of a source file.
pub trait ImportExtractor: Send + Sync {
    fn extract_imports(&self, file_path: &Path) -> Result<Vec<ImportDescriptor>, ExtractionError>;

    fn language_name(&self) -> &str;
}
