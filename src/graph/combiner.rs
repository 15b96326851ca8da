use crate::error::{GraphError, GraphResult};
use crate::graph::transaction_graph::{DirectedGraph, TransactionGraph};
use crate::types::{Address, Year};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// One edge of the combined graph, keyed by the year it was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearEdge {
    pub source: usize,
    pub target: usize,
    pub year: Year,
    pub weight: u64,
}

impl YearEdge {
    pub fn label(&self) -> String {
        self.year.to_string()
    }

    pub fn route(&self) -> Year {
        self.year
    }
}

/// Directed multigraph holding one edge per (source, target, year)
#[derive(Debug, Clone, Default)]
pub struct CombinedGraph {
    nodes: Vec<Address>,
    node_map: HashMap<Address, usize>,
    edges: Vec<YearEdge>,
}

impl CombinedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, address: &str) -> usize {
        if let Some(&index) = self.node_map.get(address) {
            return index;
        }

        let index = self.nodes.len();
        self.nodes.push(address.to_string());
        self.node_map.insert(address.to_string(), index);
        index
    }

    /// Add a parallel edge for `year`; both endpoints must already exist
    pub fn add_edge(&mut self, source: &str, target: &str, year: Year, weight: u64) -> GraphResult<()> {
        let lookup = |node: &str| {
            self.node_map
                .get(node)
                .copied()
                .ok_or_else(|| GraphError::UnknownNode {
                    node: node.to_string(),
                    edge_source: source.to_string(),
                    edge_target: target.to_string(),
                })
        };
        let source_index = lookup(source)?;
        let target_index = lookup(target)?;

        self.edges.push(YearEdge {
            source: source_index,
            target: target_index,
            year,
            weight,
        });
        Ok(())
    }

    pub fn nodes(&self) -> &[Address] {
        &self.nodes
    }

    pub fn edges(&self) -> &[YearEdge] {
        &self.edges
    }

    pub fn node_name(&self, index: usize) -> &str {
        &self.nodes[index]
    }

    /// All edges between an ordered pair, one per year it appeared in
    pub fn edges_between(&self, source: &str, target: &str) -> Vec<YearEdge> {
        match (self.node_map.get(source), self.node_map.get(target)) {
            (Some(&s), Some(&t)) => self
                .edges
                .iter()
                .filter(|edge| edge.source == s && edge.target == t)
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn edges_for_year(&self, year: Year) -> impl Iterator<Item = &YearEdge> + '_ {
        self.edges.iter().filter(move |edge| edge.year == year)
    }
}

impl DirectedGraph for CombinedGraph {
    fn node_ids(&self) -> &[Address] {
        &self.nodes
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn edge_triples(&self) -> Box<dyn Iterator<Item = (usize, usize, u64)> + '_> {
        Box::new(
            self.edges
                .iter()
                .map(|edge| (edge.source, edge.target, edge.weight)),
        )
    }
}

/// Folds the per-year updated graphs into one multigraph
pub struct MultiYearCombiner;

impl MultiYearCombiner {
    /// The earliest year provides the node set; every year contributes exactly the
    /// edges present in its own graph, labelled with that year.
    pub fn combine(graphs: &BTreeMap<Year, TransactionGraph>) -> GraphResult<CombinedGraph> {
        let (reference_year, reference) = graphs.iter().next().ok_or_else(|| {
            GraphError::InvalidParameter("no yearly graphs to combine".to_string())
        })?;

        let mut combined = CombinedGraph::new();
        for address in reference.nodes() {
            combined.add_node(address);
        }
        debug!(
            "Combined graph takes {} nodes from {}",
            combined.nodes.len(),
            reference_year
        );

        for (year, graph) in graphs {
            if graph.node_count() != reference.node_count() {
                debug!(
                    "Graph for {} has {} nodes, reference has {}",
                    year,
                    graph.node_count(),
                    reference.node_count()
                );
            }

            for (source, target, weight) in graph.edges() {
                combined.add_edge(source, target, *year, weight)?;
            }
            info!(
                "Added {} edges for {} to combined graph ({} total)",
                graph.edge_count(),
                year,
                combined.edges.len()
            );
        }

        Ok(combined)
    }
}
