use indexmap::IndexMap;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{AnalysisKind, CacheStore};
use super::changes::{ChangeDetector, ChangeSet, CommitInfo};
use super::snapshot::{DependencySnapshot, MetricsSnapshot};
use crate::config::ExtractionConfig;
use crate::core::scanner::{module_id, FileInfo, FileScanner};
use crate::core::ExtractionPipeline;
use crate::error::Result;
use crate::parsers::metrics::{collect_file_metrics, FileMetrics};
use crate::parsers::python::PythonImportExtractor;
use crate::parsers::ImportExtractor;

/// More distinct changed files than this forces a full rebuild.
pub const CHANGE_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Full => f.write_str("full"),
            RunMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Outcome of the mode decision for one analysis kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    Full { reason: String },
    Incremental { base_revision: String, changes: ChangeSet },
}

impl RunPlan {
    fn full(reason: impl Into<String>) -> Self {
        RunPlan::Full {
            reason: reason.into(),
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, RunPlan::Incremental { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRun<T> {
    pub mode: RunMode,
    /// Revision the snapshot was computed for, `None` for uncommitted trees.
    pub revision: Option<String>,
    pub snapshot: T,
}

/// Snapshot types the analyzer knows how to cache.
trait CachedSnapshot: Serialize + DeserializeOwned {
    const KIND: AnalysisKind;

    fn restamp(&mut self, last_updated: Option<CommitInfo>);
}

impl CachedSnapshot for DependencySnapshot {
    const KIND: AnalysisKind = AnalysisKind::Dependencies;

    fn restamp(&mut self, last_updated: Option<CommitInfo>) {
        self.recalculate_metrics(last_updated);
    }
}

impl CachedSnapshot for MetricsSnapshot {
    const KIND: AnalysisKind = AnalysisKind::Metrics;

    fn restamp(&mut self, last_updated: Option<CommitInfo>) {
        self.recalculate_aggregates(last_updated);
    }
}

/// Chooses between full and incremental recomputation and keeps the
/// per-revision snapshots in the cache store up to date.
///
/// Any doubt about the incremental path (no cache, unreadable cache, failing
/// change detector, too many changes) falls back to a full run.
pub struct IncrementalAnalyzer<D, C> {
    root: PathBuf,
    config: ExtractionConfig,
    extractor: Arc<dyn ImportExtractor>,
    detector: D,
    cache: C,
}

impl<D: ChangeDetector, C: CacheStore> IncrementalAnalyzer<D, C> {
    pub fn new(root: impl Into<PathBuf>, config: ExtractionConfig, detector: D, cache: C) -> Self {
        Self {
            root: root.into(),
            config,
            extractor: Arc::new(PythonImportExtractor::new()),
            detector,
            cache,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ImportExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn should_use_incremental(
        &self,
        kind: AnalysisKind,
        current_revision: Option<&str>,
        force_full: bool,
    ) -> RunPlan {
        if force_full {
            return RunPlan::full("full analysis requested");
        }

        let keys = match self.cache.list_keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "cannot list cached snapshots");
                return RunPlan::full("cache unavailable");
            }
        };
        if keys.is_empty() {
            return RunPlan::full("no cached snapshots");
        }

        let Some(current) = current_revision else {
            return RunPlan::full("no current revision");
        };
        let Some(base) = keys.iter().rev().find(|key| key.kind == kind.as_str()) else {
            return RunPlan::full(format!("no cached {kind} snapshot"));
        };

        let changes = match self.detector.changes(&base.revision, current) {
            Ok(changes) => changes,
            Err(err) => {
                warn!(from = %base.revision, to = current, error = %err, "change detection failed");
                return RunPlan::full("change detection failed");
            }
        };

        let changed = changes.all_files().len();
        if changed > CHANGE_THRESHOLD {
            return RunPlan::full(format!(
                "{changed} files changed, more than {CHANGE_THRESHOLD}"
            ));
        }

        RunPlan::Incremental {
            base_revision: base.revision.clone(),
            changes,
        }
    }

    pub fn analyze_dependencies(&self, force_full: bool) -> Result<AnalysisRun<DependencySnapshot>> {
        self.analyze(force_full, Self::full_dependencies, Self::update_dependencies)
    }

    pub fn analyze_metrics(&self, force_full: bool) -> Result<AnalysisRun<MetricsSnapshot>> {
        self.analyze(force_full, Self::full_metrics, Self::update_metrics)
    }

    fn analyze<S: CachedSnapshot>(
        &self,
        force_full: bool,
        full: fn(&Self) -> Result<S>,
        update: fn(&Self, &mut S, &ChangeSet) -> Result<()>,
    ) -> Result<AnalysisRun<S>> {
        let kind = S::KIND;
        let revision = self.current_revision();
        let plan = self.should_use_incremental(kind, revision.as_deref(), force_full);

        let (base_revision, changes, current) = match (plan, revision) {
            (RunPlan::Incremental { base_revision, changes }, Some(current)) => {
                (base_revision, changes, current)
            }
            (RunPlan::Full { reason }, revision) => {
                info!(analysis = %kind, reason = %reason, "running full analysis");
                return self.run_full(full, revision);
            }
            (RunPlan::Incremental { .. }, None) => {
                return self.run_full(full, None);
            }
        };

        let (mut snapshot, from_base) = match self.load::<S>(kind, &current) {
            Some(snapshot) => (snapshot, false),
            None => match self.load::<S>(kind, &base_revision) {
                Some(snapshot) => (snapshot, true),
                None => {
                    info!(analysis = %kind, "no usable cached snapshot, running full analysis");
                    return self.run_full(full, Some(current));
                }
            },
        };

        let relevant = changes.filtered(&self.config.source_extension);
        if relevant.is_empty() {
            info!(analysis = %kind, base = %base_revision, "no relevant changes, reusing cached snapshot");
            if from_base {
                self.store(kind, &current, &snapshot);
            }
            return Ok(AnalysisRun {
                mode: RunMode::Incremental,
                revision: Some(current),
                snapshot,
            });
        }

        info!(
            analysis = %kind,
            base = %base_revision,
            added = relevant.added.len(),
            modified = relevant.modified.len(),
            deleted = relevant.deleted.len(),
            "running incremental analysis"
        );
        update(self, &mut snapshot, &relevant)?;
        snapshot.restamp(self.commit_info());
        self.store(kind, &current, &snapshot);

        Ok(AnalysisRun {
            mode: RunMode::Incremental,
            revision: Some(current),
            snapshot,
        })
    }

    fn run_full<S: CachedSnapshot>(
        &self,
        full: fn(&Self) -> Result<S>,
        revision: Option<String>,
    ) -> Result<AnalysisRun<S>> {
        let kind = S::KIND;
        let mut snapshot = full(self)?;
        snapshot.restamp(self.commit_info());
        match &revision {
            Some(revision) => self.store(kind, revision, &snapshot),
            None => debug!(analysis = %kind, "no revision, snapshot not cached"),
        }
        Ok(AnalysisRun {
            mode: RunMode::Full,
            revision,
            snapshot,
        })
    }

    fn full_dependencies(&self) -> Result<DependencySnapshot> {
        let mut pipeline = ExtractionPipeline::new(self.config.clone(), Arc::clone(&self.extractor));
        let graph = pipeline.extract(&self.root)?;
        Ok(DependencySnapshot::from_graph(&graph))
    }

    fn update_dependencies(&self, snapshot: &mut DependencySnapshot, changes: &ChangeSet) -> Result<()> {
        for path in &changes.deleted {
            let id = relative_id(path);
            if snapshot.remove_module(&id) {
                debug!(module = %id, "removed deleted module");
            }
        }

        let changed: Vec<&str> = changes.changed_files().into_iter().collect();
        if changed.is_empty() {
            return Ok(());
        }

        let mut pipeline = ExtractionPipeline::new(self.config.clone(), Arc::clone(&self.extractor));
        let partial = pipeline.extract_files(&self.root, changed.as_slice())?;
        let replaced = snapshot.merge_partial(&partial);
        debug!(replaced, errors = pipeline.errors().len(), "merged partial graph");
        Ok(())
    }

    fn full_metrics(&self) -> Result<MetricsSnapshot> {
        let files = self.scanner()?.scan_directory(&self.root)?;
        let mut snapshot = MetricsSnapshot::default();
        snapshot.merge_partial(collect_metrics(&files));
        Ok(snapshot)
    }

    fn update_metrics(&self, snapshot: &mut MetricsSnapshot, changes: &ChangeSet) -> Result<()> {
        for path in &changes.deleted {
            snapshot.remove_file(&relative_id(path));
        }

        let changed: Vec<&str> = changes.changed_files().into_iter().collect();
        let files = self.scanner()?.select_files(&self.root, changed.as_slice());
        let fresh = collect_metrics(&files);
        // A changed file without fresh metrics must not keep its old record.
        for file in &files {
            if !fresh.contains_key(&file.module_id) && snapshot.remove_file(&file.module_id) {
                debug!(file = %file.module_id, "dropped stale file metrics");
            }
        }
        let replaced = snapshot.merge_partial(fresh);
        debug!(replaced, "merged file metrics");
        Ok(())
    }

    fn scanner(&self) -> Result<FileScanner> {
        FileScanner::new(
            self.config.include.as_slice(),
            self.config.exclude.as_slice(),
            &self.config.source_extension,
        )
    }

    fn current_revision(&self) -> Option<String> {
        match self.detector.latest_revision() {
            Ok(revision) => revision,
            Err(err) => {
                warn!(error = %err, "cannot determine the current revision");
                None
            }
        }
    }

    fn commit_info(&self) -> Option<CommitInfo> {
        match self.detector.commit_info() {
            Ok(info) => Some(info),
            Err(err) => {
                debug!(error = %err, "no commit info");
                None
            }
        }
    }

    fn load<S: CachedSnapshot>(&self, kind: AnalysisKind, revision: &str) -> Option<S> {
        let key = self.cache.make_key(kind, revision);
        match self.cache.get(&key) {
            Ok(Some(blob)) => match bincode::deserialize(&blob) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(key = %key, error = %err, "discarding undecodable snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to read cached snapshot");
                None
            }
        }
    }

    fn store<S: CachedSnapshot>(&self, kind: AnalysisKind, revision: &str, snapshot: &S) {
        let key = self.cache.make_key(kind, revision);
        let blob = match bincode::serialize(snapshot) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode snapshot");
                return;
            }
        };
        match self.cache.set(&key, blob) {
            Ok(()) => debug!(key = %key, "stored snapshot"),
            Err(err) => warn!(key = %key, error = %err, "failed to store snapshot"),
        }
    }
}

fn relative_id(path: &str) -> String {
    module_id(Path::new(""), Path::new(path))
}

fn collect_metrics(files: &[FileInfo]) -> IndexMap<String, FileMetrics> {
    let collected: Vec<Option<(String, FileMetrics)>> = files
        .par_iter()
        .map(|file| match collect_file_metrics(&file.path) {
            Ok(metrics) => Some((file.module_id.clone(), metrics)),
            Err(err) => {
                warn!(file = %file.module_id, error = %err, "failed to collect metrics");
                None
            }
        })
        .collect();
    collected.into_iter().flatten().collect()
}
