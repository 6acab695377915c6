//! Cached analysis results and their aggregate metrics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::changes::CommitInfo;
use crate::core::DependencyGraph;
use crate::parsers::metrics::FileMetrics;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyMetrics {
    pub module_count: usize,
    pub total_dependencies: usize,
    pub last_updated: Option<CommitInfo>,
}

/// Module -> direct dependency targets, plus aggregates.
///
/// Every known module has a key. Edge targets may name modules that were
/// deleted since; such dangling targets are kept and count as modules with
/// no further dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub dependencies: IndexMap<String, Vec<String>>,
    pub metrics: DependencyMetrics,
}

impl DependencySnapshot {
    /// Snapshot of every node of `graph`, in node order.
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let dependencies = graph
            .node_ids()
            .map(|id| (id.to_string(), graph.dependencies(id).map(str::to_string).collect()))
            .collect();
        Self {
            dependencies,
            metrics: DependencyMetrics::default(),
        }
    }

    /// Remove a deleted module. Edges pointing at it are left in place.
    pub fn remove_module(&mut self, module: &str) -> bool {
        self.dependencies.shift_remove(module).is_some()
    }

    /// Replace the edge lists of every module scanned in `partial`.
    ///
    /// An existing list is overwritten rather than extended. Modules only
    /// referenced as targets in `partial` keep their current entry, or get an
    /// empty one when the snapshot does not know them yet.
    pub fn merge_partial(&mut self, partial: &DependencyGraph) -> usize {
        let mut replaced = 0;
        for module in partial.scanned_modules() {
            let targets = partial.dependencies(module).map(str::to_string).collect();
            self.dependencies.insert(module.to_string(), targets);
            replaced += 1;
        }
        for module in partial.node_ids() {
            if !self.dependencies.contains_key(module) {
                self.dependencies.insert(module.to_string(), Vec::new());
            }
        }
        replaced
    }

    pub fn recalculate_metrics(&mut self, last_updated: Option<CommitInfo>) {
        self.metrics = DependencyMetrics {
            module_count: self.dependencies.len(),
            total_dependencies: self.dependencies.values().map(Vec::len).sum(),
            last_updated,
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub total_files: usize,
    pub total_lines: usize,
    pub avg_lines_per_file: f64,
    pub last_updated: Option<CommitInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub file_metrics: IndexMap<String, FileMetrics>,
    pub aggregated: AggregatedMetrics,
}

impl MetricsSnapshot {
    pub fn remove_file(&mut self, file: &str) -> bool {
        self.file_metrics.shift_remove(file).is_some()
    }

    /// Overwrite the records of every file in `partial`.
    pub fn merge_partial(&mut self, partial: IndexMap<String, FileMetrics>) -> usize {
        let replaced = partial.len();
        for (file, metrics) in partial {
            self.file_metrics.insert(file, metrics);
        }
        replaced
    }

    pub fn recalculate_aggregates(&mut self, last_updated: Option<CommitInfo>) {
        let total_files = self.file_metrics.len();
        let total_lines: usize = self.file_metrics.values().map(|m| m.lines).sum();
        self.aggregated = AggregatedMetrics {
            total_files,
            total_lines,
            avg_lines_per_file: if total_files > 0 {
                total_lines as f64 / total_files as f64
            } else {
                0.0
            },
            last_updated,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{EdgeMetadata, NodeMetadata, PYTHON_MODULE};

    fn snapshot(entries: Vec<(&str, Vec<&str>)>) -> DependencySnapshot {
        DependencySnapshot {
            dependencies: entries
                .into_iter()
                .map(|(module, targets)| {
                    (module.to_string(), targets.into_iter().map(str::to_string).collect())
                })
                .collect(),
            metrics: DependencyMetrics::default(),
        }
    }

    #[test]
    fn merge_replaces_scanned_modules_only() {
        let mut cached = snapshot(vec![("A", vec!["B"]), ("C", vec!["D"]), ("D", vec!["C"])]);

        let mut partial = DependencyGraph::new();
        partial.add_node("A", NodeMetadata::scanned(PYTHON_MODULE, Vec::new()));
        partial.add_edge("A", "D", EdgeMetadata::default());

        assert_eq!(cached.merge_partial(&partial), 1);
        assert_eq!(cached.dependencies["A"], ["D"]);
        assert_eq!(cached.dependencies["C"], ["D"]);
        assert_eq!(cached.dependencies["D"], ["C"]);
    }

    #[test]
    fn merge_adds_new_targets_without_touching_known_ones() {
        let mut cached = snapshot(vec![("A", vec![]), ("B", vec!["A"])]);

        let mut partial = DependencyGraph::new();
        partial.add_node("A", NodeMetadata::scanned(PYTHON_MODULE, Vec::new()));
        partial.add_edge("A", "B", EdgeMetadata::default());
        partial.add_edge("A", "ext.so", EdgeMetadata::default());

        assert_eq!(cached.merge_partial(&partial), 1);
        assert_eq!(cached.dependencies["A"], ["B", "ext.so"]);
        assert_eq!(cached.dependencies["B"], ["A"]);
        assert_eq!(cached.dependencies["ext.so"], Vec::<String>::new());
        assert_eq!(cached.dependencies.len(), 3);
    }

    #[test]
    fn metrics_follow_the_dependency_map() {
        let mut cached = snapshot(vec![("A", vec!["B", "C"]), ("C", vec![])]);
        cached.remove_module("B");
        cached.recalculate_metrics(None);

        assert_eq!(cached.metrics.module_count, 2);
        assert_eq!(cached.metrics.total_dependencies, 2);
    }

    #[test]
    fn aggregates_average_lines() {
        let mut metrics = MetricsSnapshot::default();
        metrics.file_metrics.insert("a.py".into(), FileMetrics { lines: 10, ..Default::default() });
        metrics.file_metrics.insert("b.py".into(), FileMetrics { lines: 30, ..Default::default() });
        metrics.recalculate_aggregates(None);

        assert_eq!(metrics.aggregated.total_files, 2);
        assert_eq!(metrics.aggregated.total_lines, 40);
        assert!((metrics.aggregated.avg_lines_per_file - 20.0).abs() < f64::EPSILON);
    }
}
