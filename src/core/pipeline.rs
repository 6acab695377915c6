use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::graph::{DependencyGraph, EdgeMetadata, NodeMetadata, PYTHON_MODULE};
use super::resolver::{specifier, ImportPathResolver, Resolution};
use super::scanner::{module_id, FileInfo, FileScanner};
use crate::config::ExtractionConfig;
use crate::error::{Error, ResolutionError, Result};
use crate::parsers::python::PythonImportExtractor;
use crate::parsers::{ImportDescriptor, ImportExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    ExtractionError,
    ResolutionError,
}

/// A failure confined to one file. The run continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error_type: FileErrorKind,
    pub message: String,
}

/// Everything one file contributes to the graph.
struct FileOutcome {
    module_id: String,
    /// `None` when the extractor failed and the file is skipped.
    metadata: Option<NodeMetadata>,
    edges: Vec<(String, EdgeMetadata)>,
    unresolved: Vec<String>,
    external: Vec<String>,
    errors: Vec<FileError>,
}

impl FileOutcome {
    fn new(module_id: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            metadata: None,
            edges: Vec::new(),
            unresolved: Vec::new(),
            external: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn resolution_error(&mut self, err: &ResolutionError) {
        warn!(file = %self.module_id, error = %err, "failed to resolve import");
        self.errors.push(FileError {
            file: self.module_id.clone(),
            error_type: FileErrorKind::ResolutionError,
            message: err.to_string(),
        });
    }
}

/// Drives import extraction and resolution over a source tree.
///
/// Files are processed in parallel. Their outcomes are applied to the graph
/// by a single writer in enumeration order, so the result does not depend on
/// scheduling. A new resolver, and with it an empty resolution cache, is
/// created for every run.
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    extractor: Arc<dyn ImportExtractor>,
    errors: Vec<FileError>,
}

impl ExtractionPipeline {
    pub fn new(config: ExtractionConfig, extractor: Arc<dyn ImportExtractor>) -> Self {
        Self {
            config,
            extractor,
            errors: Vec::new(),
        }
    }

    pub fn python(config: ExtractionConfig) -> Self {
        Self::new(config, Arc::new(PythonImportExtractor::new()))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Per-file errors recorded by the last run.
    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }

    /// Extract the whole tree using the configured globs.
    pub fn extract(&mut self, root: &Path) -> Result<DependencyGraph> {
        let include = self.config.include.clone();
        let exclude = self.config.exclude.clone();
        self.extract_with(root, &include, &exclude)
    }

    pub fn extract_with(
        &mut self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<DependencyGraph> {
        let root = canonical_root(root)?;
        info!(
            root = %root.display(),
            language = self.extractor.language_name(),
            "starting dependency extraction"
        );

        let scanner = FileScanner::new(include, exclude, &self.config.source_extension)?;
        let files = scanner.scan_directory(&root)?;
        info!(files = files.len(), "found source files");

        self.run(&root, files)
    }

    /// Extract only `files`, given relative to `root`.
    ///
    /// Files that no longer exist, lack the source extension or are excluded
    /// by the configured globs are skipped.
    pub fn extract_files<S: AsRef<str>>(&mut self, root: &Path, files: &[S]) -> Result<DependencyGraph> {
        let root = canonical_root(root)?;
        let scanner = FileScanner::new(
            self.config.include.as_slice(),
            self.config.exclude.as_slice(),
            &self.config.source_extension,
        )?;

        let selected = scanner.select_files(&root, files);
        info!(files = selected.len(), "extracting changed files");

        self.run(&root, selected)
    }

    fn run(&mut self, root: &Path, files: Vec<FileInfo>) -> Result<DependencyGraph> {
        self.errors.clear();

        let resolver = ImportPathResolver::new(root)
            .with_search_roots(search_roots(root, &self.config.search_roots))
            .with_source_extension(&self.config.source_extension);
        let extractor = self.extractor.as_ref();

        let process = || -> Vec<FileOutcome> {
            files
                .par_iter()
                .map(|file| process_file(root, extractor, &resolver, file))
                .collect()
        };
        let outcomes = if self.config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()?
                .install(process)
        } else {
            process()
        };

        let mut graph = DependencyGraph::new();

        // Scanned files first so their metadata wins over bare edge targets.
        for outcome in &outcomes {
            if let Some(metadata) = &outcome.metadata {
                graph.add_node(&outcome.module_id, metadata.clone());
            }
        }

        for outcome in outcomes {
            for (target, metadata) in outcome.edges {
                graph.add_edge(&outcome.module_id, &target, metadata);
            }
            for import_name in &outcome.unresolved {
                graph.add_unresolved_import(&outcome.module_id, import_name);
            }
            for module_name in &outcome.external {
                graph.add_external_dependency(&outcome.module_id, module_name);
            }
            self.errors.extend(outcome.errors);
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            unresolved = graph.unresolved_count(),
            errors = self.errors.len(),
            "dependency extraction complete"
        );
        Ok(graph)
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    match fs::canonicalize(root) {
        Ok(path) if path.is_dir() => Ok(path),
        _ => Err(Error::RootNotFound(root.to_path_buf())),
    }
}

fn search_roots(root: &Path, configured: &[PathBuf]) -> Vec<PathBuf> {
    configured
        .iter()
        .filter_map(|search_root| {
            let joined = root.join(search_root);
            match fs::canonicalize(&joined) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(path = %joined.display(), error = %err, "ignoring search root");
                    None
                }
            }
        })
        .collect()
}

fn process_file(
    root: &Path,
    extractor: &dyn ImportExtractor,
    resolver: &ImportPathResolver,
    file: &FileInfo,
) -> FileOutcome {
    let mut outcome = FileOutcome::new(&file.module_id);

    let imports = match extractor.extract_imports(&file.path) {
        Ok(imports) => imports,
        Err(err) => {
            warn!(file = %file.module_id, error = %err, "failed to extract imports");
            outcome.errors.push(FileError {
                file: file.module_id.clone(),
                error_type: FileErrorKind::ExtractionError,
                message: err.to_string(),
            });
            return outcome;
        }
    };

    for import in &imports {
        resolve_descriptor(root, resolver, &file.path, import, &mut outcome);
    }

    debug!(
        file = %file.module_id,
        imports = imports.len(),
        edges = outcome.edges.len(),
        "processed file"
    );
    outcome.metadata = Some(NodeMetadata::scanned(PYTHON_MODULE, imports));
    outcome
}

/// Resolve one import into edges, external or unresolved records.
///
/// For `from X import a, b` each name is probed as submodule `X.a` first.
/// The statement's own module is resolved, and classified when missing, only
/// for plain imports or when some name is not a submodule.
fn resolve_descriptor(
    root: &Path,
    resolver: &ImportPathResolver,
    source: &Path,
    import: &ImportDescriptor,
    outcome: &mut FileOutcome,
) {
    let level = import.relative_level;
    let mut resolve_module = import.names.is_empty();

    for name in &import.names {
        let submodule = if import.module_path.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", import.module_path, name)
        };
        match resolver.resolve(&submodule, Some(source), level) {
            Ok(Resolution::Resolved(path)) => {
                let metadata = EdgeMetadata::new(specifier(&submodule, level), import.kind, import.line);
                outcome.edges.push((module_id(root, &path), metadata));
            }
            Ok(_) => resolve_module = true,
            Err(err) => outcome.resolution_error(&err),
        }
    }

    if !resolve_module {
        return;
    }

    let import_name = specifier(&import.module_path, level);
    match resolver.resolve(&import.module_path, Some(source), level) {
        Ok(Resolution::Resolved(path)) => {
            let metadata = EdgeMetadata::new(import_name, import.kind, import.line);
            outcome.edges.push((module_id(root, &path), metadata));
        }
        Ok(Resolution::External) => outcome.external.push(import_name),
        Ok(Resolution::Unresolved) => outcome.unresolved.push(import_name),
        Err(err) => outcome.resolution_error(&err),
    }
}
