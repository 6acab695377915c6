pub mod analyzer;
pub mod cache;
pub mod changes;
pub mod snapshot;

pub use analyzer::{AnalysisRun, IncrementalAnalyzer, RunMode, RunPlan, CHANGE_THRESHOLD};
pub use cache::{AnalysisKind, CacheKey, CacheStore, SnapshotCache, DEFAULT_MAX_SNAPSHOTS};
pub use changes::{ChangeDetector, ChangeSet, CommitInfo, GitChangeDetector};
pub use snapshot::{AggregatedMetrics, DependencyMetrics, DependencySnapshot, MetricsSnapshot};
