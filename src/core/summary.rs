use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;

use super::graph::{DependencyGraph, RankBy};

pub const DEFAULT_TOP_N: usize = 10;

/// Aggregate view of a dependency graph.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DependencySummary {
    pub total_modules: usize,
    pub total_dependencies: usize,
    pub average_dependencies: f64,
    pub most_depended_on: Vec<(String, usize)>,
    pub most_dependencies: Vec<(String, usize)>,
    /// Cycles from the single-pass detector.
    pub cycles: Vec<Vec<String>>,
    pub has_cycles: bool,
    /// Strongly connected components with more than one module, covering
    /// every cyclic region even where `cycles` reports only part of it.
    pub tangled_groups: Vec<Vec<String>>,
    pub unresolved_imports: usize,
}

impl DependencySummary {
    pub fn from_graph(graph: &DependencyGraph, top_n: usize) -> Self {
        let total_modules = graph.node_count();
        let total_dependencies = graph.edge_count();
        let average_dependencies = if total_modules > 0 {
            total_dependencies as f64 / total_modules as f64
        } else {
            0.0
        };
        let cycles = graph.find_cycles();

        Self {
            total_modules,
            total_dependencies,
            average_dependencies,
            most_depended_on: graph.rank(RankBy::Dependents, top_n),
            most_dependencies: graph.rank(RankBy::Dependencies, top_n),
            has_cycles: !cycles.is_empty(),
            cycles,
            tangled_groups: tangled_groups(graph),
            unresolved_imports: graph.unresolved_count(),
        }
    }
}

/// Tarjan SCCs of size > 1, each in node insertion order, ordered by their
/// first member.
pub fn tangled_groups(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut digraph: DiGraph<&str, ()> = DiGraph::with_capacity(graph.node_count(), graph.edge_count());
    let mut indices: HashMap<&str, NodeIndex> = HashMap::with_capacity(graph.node_count());
    let mut order: HashMap<NodeIndex, usize> = HashMap::with_capacity(graph.node_count());

    for (position, id) in graph.node_ids().enumerate() {
        let index = digraph.add_node(id);
        indices.insert(id, index);
        order.insert(index, position);
    }
    for id in graph.node_ids() {
        for target in graph.dependencies(id) {
            if let (Some(&from), Some(&to)) = (indices.get(id), indices.get(target)) {
                digraph.add_edge(from, to, ());
            }
        }
    }

    let mut groups: Vec<Vec<NodeIndex>> = tarjan_scc(&digraph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .collect();
    for group in &mut groups {
        group.sort_by_key(|index| order[index]);
    }
    groups.sort_by_key(|group| order[&group[0]]);

    groups
        .into_iter()
        .map(|group| group.into_iter().map(|index| digraph[index].to_string()).collect())
        .collect()
}
