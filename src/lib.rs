//! # depwatch
//!
//! Import dependency graphs for Python source trees.
//!
//! depwatch scans a project, resolves every `import` statement to the file it
//! refers to and builds a directed graph of module dependencies. Imports that
//! point outside the project are recorded as external dependencies, imports
//! that look internal but match no file are recorded as unresolved.
//!
//! ## Incremental analysis
//!
//! Results are cached per revision. On later runs only the files reported
//! changed since the last cached revision are re-extracted and merged into
//! the cached snapshot; large or uncertain change sets fall back to a full
//! rebuild.

pub mod config;
pub mod core;
pub mod error;
pub mod incremental;
pub mod parsers;

pub use crate::config::Config;
pub use crate::core::{DependencyGraph, DependencySummary, ExtractionPipeline};
pub use crate::error::{Error, Result};
