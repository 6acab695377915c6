//! Line-oriented per-file metrics for the metrics analysis.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::common::read_source;
use crate::error::ExtractionError;

static FUNCTION_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+[A-Za-z_]\w*\s*\(").expect("valid regex"));
static CLASS_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*class\s+[A-Za-z_]\w*\s*[(:]").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetrics {
    pub lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub functions: usize,
    pub classes: usize,
}

impl FileMetrics {
    pub fn from_source(source: &str) -> Self {
        let mut metrics = FileMetrics::default();

        for line in source.lines() {
            metrics.lines += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                metrics.blank_lines += 1;
            } else if trimmed.starts_with('#') {
                metrics.comment_lines += 1;
            } else {
                metrics.code_lines += 1;
                if FUNCTION_DEF.is_match(line) {
                    metrics.functions += 1;
                } else if CLASS_DEF.is_match(line) {
                    metrics.classes += 1;
                }
            }
        }

        metrics
    }
}

pub fn collect_file_metrics(file_path: &Path) -> Result<FileMetrics, ExtractionError> {
    let source = read_source(file_path).map_err(|source| ExtractionError::Io {
        path: file_path.to_path_buf(),
        source,
    })?;
    Ok(FileMetrics::from_source(&source))
}
