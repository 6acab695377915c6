use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;
use crate::parsers::{ImportDescriptor, ImportKind};

/// Tag stored on nodes for files the pipeline actually scanned.
pub const PYTHON_MODULE: &str = "python_module";

/// Metadata of a module node.
///
/// Nodes created only as an edge target carry the default (empty) metadata
/// until their own file is scanned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportDescriptor>,
}

impl NodeMetadata {
    pub fn scanned(file_type: impl Into<String>, imports: Vec<ImportDescriptor>) -> Self {
        Self {
            file_type: Some(file_type.into()),
            imports,
        }
    }

    pub fn is_scanned(&self) -> bool {
        self.file_type.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeMetadata {
    /// Import text as written, e.g. `pkg.mod` or `..util`.
    pub import_name: String,
    pub kind: ImportKind,
    pub line: usize,
}

impl EdgeMetadata {
    pub fn new(import_name: impl Into<String>, kind: ImportKind, line: usize) -> Self {
        Self {
            import_name: import_name.into(),
            kind,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: String,
    pub metadata: EdgeMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    /// Inbound edge count, "most depended on".
    Dependents,
    /// Outbound edge count, "most dependencies".
    Dependencies,
}

/// Serialized form of a [`DependencyGraph`].
///
/// Map order is insertion order, so serializing a deserialized document
/// reproduces the original bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphDocument {
    pub nodes: IndexMap<String, NodeMetadata>,
    pub edges: IndexMap<String, Vec<String>>,
    pub unresolved_imports: IndexMap<String, Vec<String>>,
    pub external_dependencies: IndexMap<String, Vec<String>>,
}

/// Directed graph of modules keyed by project-relative path.
///
/// All maps preserve insertion order, which fixes node iteration order for
/// cycle detection, ranking ties and serialization.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<String, NodeMetadata>,
    edges: IndexMap<String, Vec<Edge>>,
    reverse_edges: IndexMap<String, Vec<String>>,
    unresolved_imports: IndexMap<String, Vec<String>>,
    external_dependencies: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. An existing node keeps its metadata.
    pub fn add_node(&mut self, id: &str, metadata: NodeMetadata) {
        if !self.nodes.contains_key(id) {
            self.nodes.insert(id.to_string(), metadata);
        }
    }

    /// Insert `source -> target`, creating missing endpoints.
    ///
    /// Returns `false` when the pair already exists; the first edge's
    /// metadata is kept. Self-edges are accepted.
    pub fn add_edge(&mut self, source: &str, target: &str, metadata: EdgeMetadata) -> bool {
        self.add_node(source, NodeMetadata::default());
        self.add_node(target, NodeMetadata::default());

        let outgoing = self.edges.entry(source.to_string()).or_default();
        if outgoing.iter().any(|edge| edge.target == target) {
            return false;
        }
        outgoing.push(Edge {
            target: target.to_string(),
            metadata,
        });
        self.reverse_edges
            .entry(target.to_string())
            .or_default()
            .push(source.to_string());
        true
    }

    pub fn add_unresolved_import(&mut self, source: &str, import_name: &str) {
        self.unresolved_imports
            .entry(source.to_string())
            .or_default()
            .push(import_name.to_string());
    }

    pub fn add_external_dependency(&mut self, source: &str, module_name: &str) {
        self.external_dependencies
            .entry(source.to_string())
            .or_default()
            .insert(module_name.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&NodeMetadata> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Nodes whose own file was scanned, in insertion order.
    pub fn scanned_modules(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, metadata)| metadata.is_scanned())
            .map(|(id, _)| id.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn edges(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Direct dependencies of `id`, in insertion order.
    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges(id).iter().map(|edge| edge.target.as_str())
    }

    /// Modules that directly import `id`.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.reverse_edges
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unresolved_imports(&self, id: &str) -> &[String] {
        self.unresolved_imports
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn external_dependencies(&self, id: &str) -> Option<&IndexSet<String>> {
        self.external_dependencies.get(id)
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved_imports.values().map(Vec::len).sum()
    }

    /// Single-pass DFS cycle detection.
    ///
    /// Roots are taken in node insertion order. A node whose subtree is
    /// finished is never examined again, so a cycle running through an already
    /// finished node is not reported a second time and overlapping cycles may
    /// be missed. Each reported cycle repeats its first node at the end.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        // The frame stack doubles as the current path.
        let mut stack: Vec<(&str, usize)> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();

        for start in self.nodes.keys() {
            if visited.contains(start.as_str()) {
                continue;
            }
            stack.push((start.as_str(), 0));
            on_path.insert(start.as_str());

            while let Some(&(node, next_index)) = stack.last() {
                let outgoing = self.edges(node);
                if let Some(edge) = outgoing.get(next_index) {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    let next = edge.target.as_str();
                    if visited.contains(next) {
                        continue;
                    }
                    if on_path.contains(next) {
                        let begin = stack
                            .iter()
                            .position(|(id, _)| *id == next)
                            .unwrap_or_default();
                        let mut cycle: Vec<String> =
                            stack[begin..].iter().map(|(id, _)| id.to_string()).collect();
                        cycle.push(next.to_string());
                        cycles.push(cycle);
                        continue;
                    }
                    stack.push((next, 0));
                    on_path.insert(next);
                } else {
                    stack.pop();
                    on_path.remove(node);
                    visited.insert(node);
                }
            }
        }

        cycles
    }

    /// Every module reachable from `id` through one or more edges.
    ///
    /// `id` itself is included only when a cycle leads back to it. Targets with
    /// no node or no edges contribute nothing further.
    pub fn transitive_dependencies(&self, id: &str) -> IndexSet<String> {
        let mut reachable = IndexSet::new();
        let mut expanded: HashSet<&str> = HashSet::new();
        let mut frontier = vec![id];

        while let Some(node) = frontier.pop() {
            if !expanded.insert(node) {
                continue;
            }
            for dependency in self.dependencies(node) {
                reachable.insert(dependency.to_string());
                if !expanded.contains(dependency) {
                    frontier.push(dependency);
                }
            }
        }

        reachable
    }

    /// Top `limit` nodes by edge count, descending. Ties keep insertion order.
    pub fn rank(&self, by: RankBy, limit: usize) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .nodes
            .keys()
            .map(|id| {
                let count = match by {
                    RankBy::Dependents => self.dependents(id).len(),
                    RankBy::Dependencies => self.edges(id).len(),
                };
                (id.clone(), count)
            })
            .collect();

        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(limit);
        counts
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            edges: self
                .edges
                .iter()
                .filter(|(_, outgoing)| !outgoing.is_empty())
                .map(|(source, outgoing)| {
                    let targets = outgoing.iter().map(|edge| edge.target.clone()).collect();
                    (source.clone(), targets)
                })
                .collect(),
            unresolved_imports: self.unresolved_imports.clone(),
            external_dependencies: self
                .external_dependencies
                .iter()
                .map(|(source, modules)| (source.clone(), modules.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Rebuild a graph from its document. Edges get default metadata.
    pub fn from_document(document: GraphDocument) -> Self {
        let mut graph = DependencyGraph::new();

        for (id, metadata) in document.nodes {
            graph.add_node(&id, metadata);
        }
        for (source, targets) in &document.edges {
            for target in targets {
                graph.add_edge(source, target, EdgeMetadata::default());
            }
        }
        graph.unresolved_imports = document.unresolved_imports;
        for (source, modules) in document.external_dependencies {
            graph
                .external_dependencies
                .insert(source, modules.into_iter().collect());
        }

        graph
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: GraphDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(import_name: &str, line: usize) -> EdgeMetadata {
        EdgeMetadata::new(import_name, ImportKind::Absolute, line)
    }

    fn graph_with(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (source, target) in edges {
            graph.add_edge(source, target, edge(target, 1));
        }
        graph
    }

    #[test]
    fn add_node_keeps_first_metadata() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a.py", NodeMetadata::scanned(PYTHON_MODULE, Vec::new()));
        graph.add_node("a.py", NodeMetadata::default());

        assert!(graph.node("a.py").unwrap().is_scanned());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn add_edge_dedupes_by_target_and_keeps_first_metadata() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge("a.py", "b.py", edge("b", 1)));
        assert!(!graph.add_edge("a.py", "b.py", edge("pkg.b", 7)));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges("a.py")[0].metadata, edge("b", 1));
        assert_eq!(graph.dependents("b.py"), ["a.py".to_string()]);
    }

    #[test]
    fn add_edge_creates_unscanned_endpoints() {
        let graph = graph_with(&[("a.py", "b.py")]);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), ["a.py", "b.py"]);
        assert_eq!(graph.node("b.py"), Some(&NodeMetadata::default()));
        assert_eq!(graph.scanned_modules().count(), 0);
    }

    #[test]
    fn self_edges_are_kept() {
        let graph = graph_with(&[("a.py", "a.py")]);
        assert_eq!(graph.dependencies("a.py").collect::<Vec<_>>(), ["a.py"]);
        assert_eq!(graph.find_cycles(), vec![vec!["a.py", "a.py"]]);
    }

    #[test]
    fn finds_three_node_cycle() {
        let graph = graph_with(&[("A", "B"), ("B", "C"), ("C", "A")]);
        assert_eq!(graph.find_cycles(), vec![vec!["A", "B", "C", "A"]]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = graph_with(&[("A", "B"), ("A", "C"), ("B", "C")]);
        assert!(graph.find_cycles().is_empty());
    }

    #[test]
    fn finished_nodes_are_not_revisited() {
        // B <-> C is reported from A's traversal. Starting later from D reaches
        // B, which is already finished, so D -> B -> C -> B is not repeated.
        let graph = graph_with(&[("A", "B"), ("B", "C"), ("C", "B"), ("D", "B")]);
        assert_eq!(graph.find_cycles(), vec![vec!["B", "C", "B"]]);
    }

    #[test]
    fn cycles_closed_on_the_current_path_are_all_reported() {
        let graph = graph_with(&[("A", "B"), ("B", "A"), ("B", "C"), ("C", "B")]);
        assert_eq!(
            graph.find_cycles(),
            vec![vec!["A", "B", "A"], vec!["B", "C", "B"]]
        );

        let graph = graph_with(&[("A", "B"), ("B", "C"), ("C", "D"), ("D", "B"), ("C", "A")]);
        assert_eq!(
            graph.find_cycles(),
            vec![vec!["B", "C", "D", "B"], vec!["A", "B", "C", "A"]]
        );
    }

    #[test]
    fn overlapping_cycle_through_finished_node_is_not_reported() {
        // A -> D -> B -> C -> A is a distinct cycle, but B and C are finished
        // by the time D is expanded.
        let graph = graph_with(&[("A", "B"), ("B", "C"), ("C", "A"), ("A", "D"), ("D", "B")]);
        assert_eq!(graph.find_cycles(), vec![vec!["A", "B", "C", "A"]]);
    }

    #[test]
    fn transitive_dependencies_follow_chains_and_tolerate_dangling_targets() {
        let mut graph = graph_with(&[("A", "B"), ("B", "C"), ("C", "missing.py")]);
        graph.add_node("D", NodeMetadata::default());

        let reachable = graph.transitive_dependencies("A");
        let mut sorted: Vec<_> = reachable.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, ["B", "C", "missing.py"]);
        assert!(graph.transitive_dependencies("D").is_empty());
        assert!(graph.transitive_dependencies("not-a-node").is_empty());
    }

    #[test]
    fn transitive_dependencies_include_self_only_through_cycle() {
        let graph = graph_with(&[("A", "B"), ("B", "A")]);
        let reachable = graph.transitive_dependencies("A");
        assert!(reachable.contains("A"));
        assert!(reachable.contains("B"));

        let graph = graph_with(&[("A", "B")]);
        assert!(!graph.transitive_dependencies("A").contains("A"));
    }

    #[test]
    fn rank_sorts_descending_with_stable_ties() {
        let graph = graph_with(&[("A", "C"), ("B", "C"), ("B", "D"), ("E", "D")]);

        assert_eq!(
            graph.rank(RankBy::Dependents, 2),
            vec![("C".to_string(), 2), ("D".to_string(), 2)]
        );
        assert_eq!(
            graph.rank(RankBy::Dependencies, 3),
            vec![("B".to_string(), 2), ("A".to_string(), 1), ("E".to_string(), 1)]
        );
    }

    #[test]
    fn external_dependencies_are_deduplicated() {
        let mut graph = DependencyGraph::new();
        graph.add_external_dependency("a.py", "os");
        graph.add_external_dependency("a.py", "os");
        graph.add_external_dependency("a.py", "json");

        let modules: Vec<_> = graph.external_dependencies("a.py").unwrap().iter().collect();
        assert_eq!(modules, ["os", "json"]);
    }
}
