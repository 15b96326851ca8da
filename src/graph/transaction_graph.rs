use crate::error::{GraphError, GraphResult};
use crate::types::{Address, WeightedEdge};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Read-only view shared by the simple yearly graph and the multi-year multigraph.
///
/// Nodes are addressed by their position in `node_ids()`; edges are reported as
/// `(source_position, target_position, weight)`.
pub trait DirectedGraph {
    fn node_ids(&self) -> &[Address];

    fn edge_count(&self) -> usize;

    fn edge_triples(&self) -> Box<dyn Iterator<Item = (usize, usize, u64)> + '_>;

    fn node_count(&self) -> usize {
        self.node_ids().len()
    }

    /// Copy the topology into a petgraph graph whose node indices match `node_ids()`
    fn to_petgraph(&self) -> DiGraph<(), u64> {
        let mut graph = DiGraph::with_capacity(self.node_count(), self.edge_count());
        for _ in 0..self.node_count() {
            graph.add_node(());
        }
        for (source, target, weight) in self.edge_triples() {
            graph.add_edge(NodeIndex::new(source), NodeIndex::new(target), weight);
        }
        graph
    }
}

/// Directed weighted graph with at most one edge per ordered address pair
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    nodes: Vec<Address>,
    node_map: HashMap<Address, usize>,
    edges: Vec<(usize, usize, u64)>,
    edge_map: HashMap<(usize, usize), usize>,
}

impl TransactionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its position. Adding an existing node is a no-op.
    pub fn add_node(&mut self, address: &str) -> usize {
        if let Some(&index) = self.node_map.get(address) {
            return index;
        }

        let index = self.nodes.len();
        self.nodes.push(address.to_string());
        self.node_map.insert(address.to_string(), index);
        index
    }

    pub fn add_nodes<'a, I>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for address in addresses {
            self.add_node(address);
        }
    }

    /// Add a weighted edge between two existing nodes.
    ///
    /// Fails when either endpoint is absent. Re-adding a pair replaces its weight.
    pub fn add_edge(&mut self, source: &str, target: &str, weight: u64) -> GraphResult<()> {
        let source_index = self.require_node(source, source, target)?;
        let target_index = self.require_node(target, source, target)?;

        match self.edge_map.get(&(source_index, target_index)) {
            Some(&position) => {
                debug!("Replacing weight of existing edge {} -> {}", source, target);
                self.edges[position].2 = weight;
            }
            None => {
                self.edge_map
                    .insert((source_index, target_index), self.edges.len());
                self.edges.push((source_index, target_index, weight));
            }
        }

        Ok(())
    }

    fn require_node(&self, node: &str, source: &str, target: &str) -> GraphResult<usize> {
        self.node_map
            .get(node)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode {
                node: node.to_string(),
                edge_source: source.to_string(),
                edge_target: target.to_string(),
            })
    }

    pub fn contains_node(&self, address: &str) -> bool {
        self.node_map.contains_key(address)
    }

    pub fn nodes(&self) -> &[Address] {
        &self.nodes
    }

    pub fn node_set(&self) -> HashSet<&str> {
        self.nodes.iter().map(String::as_str).collect()
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<u64> {
        let source_index = self.node_map.get(source)?;
        let target_index = self.node_map.get(target)?;
        self.edge_map
            .get(&(*source_index, *target_index))
            .map(|&position| self.edges[position].2)
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, u64)> + '_ {
        self.edges.iter().map(move |&(source, target, weight)| {
            (
                self.nodes[source].as_str(),
                self.nodes[target].as_str(),
                weight,
            )
        })
    }

    /// Edges ordered by descending weight, ties kept in insertion order
    pub fn sorted_edges(&self) -> Vec<WeightedEdge> {
        let mut edges: Vec<WeightedEdge> = self
            .edges()
            .map(|(source, target, weight)| WeightedEdge::new(source, target, weight))
            .collect();
        edges.sort_by(|a, b| b.weight.cmp(&a.weight));
        edges
    }

    pub fn self_loop_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|(source, target, _)| source == target)
            .count()
    }

    /// Drop every edge whose source equals its target, returning how many were removed
    pub fn remove_self_loops(&mut self) -> usize {
        let before = self.edges.len();
        self.edges.retain(|(source, target, _)| source != target);
        let removed = before - self.edges.len();

        if removed > 0 {
            self.edge_map = self
                .edges
                .iter()
                .enumerate()
                .map(|(position, &(source, target, _))| ((source, target), position))
                .collect();
        }

        removed
    }
}

impl DirectedGraph for TransactionGraph {
    fn node_ids(&self) -> &[Address] {
        &self.nodes
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edge_triples(&self) -> Box<dyn Iterator<Item = (usize, usize, u64)> + '_> {
        Box::new(self.edges.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_graph() -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(["A", "B", "C"]);
        graph.add_edge("A", "B", 2).unwrap();
        graph.add_edge("B", "A", 1).unwrap();
        graph.add_edge("B", "C", 5).unwrap();
        graph.add_edge("C", "C", 3).unwrap();
        graph
    }

    #[test]
    fn test_duplicate_nodes_collapse() {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(["A", "B", "A", "B", "C"]);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.nodes(), &["A", "B", "C"]);
    }

    #[test]
    fn test_edge_to_unknown_node_fails() {
        let mut graph = TransactionGraph::new();
        graph.add_node("A");

        let err = graph.add_edge("A", "Z", 1).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { ref node, .. } if node == "Z"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_readding_edge_replaces_weight() {
        let mut graph = create_test_graph();
        graph.add_edge("A", "B", 9).unwrap();

        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.edge_weight("A", "B"), Some(9));
    }

    #[test]
    fn test_sorted_edges_descending_and_stable() {
        let mut graph = create_test_graph();
        graph.add_edge("A", "C", 2).unwrap();

        let weights: Vec<u64> = graph.sorted_edges().iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![5, 3, 2, 2, 1]);

        let sorted = graph.sorted_edges();
        assert_eq!((sorted[2].source.as_str(), sorted[2].target.as_str()), ("A", "B"));
        assert_eq!((sorted[3].source.as_str(), sorted[3].target.as_str()), ("A", "C"));
    }

    #[test]
    fn test_remove_self_loops() {
        let mut graph = create_test_graph();
        assert_eq!(graph.self_loop_count(), 1);

        assert_eq!(graph.remove_self_loops(), 1);
        assert_eq!(graph.self_loop_count(), 0);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_weight("B", "C"), Some(5));
        assert_eq!(graph.edge_weight("C", "C"), None);
        assert!(graph.contains_node("C"));
    }

    #[test]
    fn test_petgraph_view_matches() {
        let graph = create_test_graph();
        let view = graph.to_petgraph();

        assert_eq!(view.node_count(), 3);
        assert_eq!(view.edge_count(), 4);
        assert!(view.find_edge(NodeIndex::new(1), NodeIndex::new(2)).is_some());
    }
}
