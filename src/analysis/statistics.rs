use crate::error::{GraphError, GraphResult};
use crate::graph::DirectedGraph;
use crate::types::Address;
use petgraph::algo::kosaraju_scc;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// How many of the highest-degree nodes are reported
pub const TOP_DEGREES: usize = 5;

/// Fixed battery of structural metrics for a directed graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub basics: BasicStatistics,
    pub connectedness: ConnectednessStatistics,
    pub paths: PathStatistics,
    pub degrees: DegreeStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicStatistics {
    pub no_nodes: usize,
    pub no_edges: usize,
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectednessStatistics {
    pub no_weakly_connected_components: usize,
    pub largest_weakly_connected_component: usize,
    pub no_strongly_connected_components: usize,
    pub largest_strongly_connected_component: usize,
    /// Share of all nodes, formatted as `"12.34%"` like the dataset summary
    pub percentage_nodes_largest_weakly_connected_component: String,
    pub percentage_nodes_largest_strongly_connected_component: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStatistics {
    pub no_self_loops: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeStatistics {
    pub largest_degrees: Vec<NodeDegree>,
    pub largest_weighted_degrees: Vec<NodeDegree>,
    pub average_degree: f64,
    pub average_weighted_degree: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDegree {
    pub node: Address,
    pub degree: u64,
}

impl GraphStatistics {
    /// Compute every metric. Fails with `EmptyGraph` when the graph has no nodes.
    pub fn compute<G: DirectedGraph>(graph: &G) -> GraphResult<Self> {
        let start = Instant::now();
        let no_nodes = graph.node_count();
        if no_nodes == 0 {
            return Err(GraphError::EmptyGraph {
                operation: "graph statistics",
            });
        }

        let basics = BasicStatistics {
            no_nodes,
            no_edges: graph.edge_count(),
            density: density(graph),
        };
        debug!("Basics in {:.2}s", start.elapsed().as_secs_f64());

        let weak = weakly_connected_component_sizes(graph);
        let strong = strongly_connected_component_sizes(graph);
        let largest_weak = largest_component(&weak)?;
        let largest_strong = largest_component(&strong)?;
        let connectedness = ConnectednessStatistics {
            no_weakly_connected_components: weak.len(),
            largest_weakly_connected_component: largest_weak,
            no_strongly_connected_components: strong.len(),
            largest_strongly_connected_component: largest_strong,
            percentage_nodes_largest_weakly_connected_component: percentage(largest_weak, no_nodes),
            percentage_nodes_largest_strongly_connected_component: percentage(
                largest_strong,
                no_nodes,
            ),
        };
        debug!("Connectedness in {:.2}s", start.elapsed().as_secs_f64());

        let paths = PathStatistics {
            no_self_loops: self_loop_count(graph),
        };

        let plain = degrees(graph, false);
        let weighted = degrees(graph, true);
        let degrees = DegreeStatistics {
            largest_degrees: top_degrees(graph, &plain, TOP_DEGREES),
            largest_weighted_degrees: top_degrees(graph, &weighted, TOP_DEGREES),
            average_degree: plain.iter().sum::<u64>() as f64 / no_nodes as f64,
            average_weighted_degree: weighted.iter().sum::<u64>() as f64 / no_nodes as f64,
        };

        info!(
            "Computed statistics for {} nodes and {} edges in {:.2}s",
            basics.no_nodes,
            basics.no_edges,
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            basics,
            connectedness,
            paths,
            degrees,
        })
    }
}

/// `edges / (nodes * (nodes - 1))`, or 0 for graphs with at most one node
pub fn density<G: DirectedGraph + ?Sized>(graph: &G) -> f64 {
    let nodes = graph.node_count();
    if nodes <= 1 {
        return 0.0;
    }
    graph.edge_count() as f64 / (nodes as f64 * (nodes as f64 - 1.0))
}

pub fn self_loop_count<G: DirectedGraph + ?Sized>(graph: &G) -> usize {
    graph
        .edge_triples()
        .filter(|(source, target, _)| source == target)
        .count()
}

/// Component sizes ignoring edge direction, in order of each component's first node
pub fn weakly_connected_component_sizes<G: DirectedGraph + ?Sized>(graph: &G) -> Vec<usize> {
    let nodes = graph.node_count();
    let mut components = UnionFind::<usize>::new(nodes);
    for (source, target, _) in graph.edge_triples() {
        components.union(source, target);
    }

    let mut sizes = Vec::new();
    let mut slots: HashMap<usize, usize> = HashMap::new();
    for node in 0..nodes {
        let root = components.find_mut(node);
        match slots.get(&root) {
            Some(&slot) => sizes[slot] += 1,
            None => {
                slots.insert(root, sizes.len());
                sizes.push(1);
            }
        }
    }
    sizes
}

/// Sizes of the sets of mutually reachable nodes
pub fn strongly_connected_component_sizes<G: DirectedGraph + ?Sized>(graph: &G) -> Vec<usize> {
    kosaraju_scc(&graph.to_petgraph())
        .iter()
        .map(Vec::len)
        .collect()
}

pub fn largest_component(sizes: &[usize]) -> GraphResult<usize> {
    sizes.iter().copied().max().ok_or(GraphError::EmptyGraph {
        operation: "largest component",
    })
}

/// Incident edge count per node (or incident weight when `weighted`); a self-loop counts twice
pub fn degrees<G: DirectedGraph + ?Sized>(graph: &G, weighted: bool) -> Vec<u64> {
    let mut degrees = vec![0u64; graph.node_count()];
    for (source, target, weight) in graph.edge_triples() {
        let amount = if weighted { weight } else { 1 };
        degrees[source] += amount;
        degrees[target] += amount;
    }
    degrees
}

/// The `k` largest degrees with their nodes; ties keep node order
pub fn top_degrees<G: DirectedGraph + ?Sized>(graph: &G, degrees: &[u64], k: usize) -> Vec<NodeDegree> {
    let mut order: Vec<usize> = (0..degrees.len()).collect();
    order.sort_by(|a, b| degrees[*b].cmp(&degrees[*a]));

    order
        .into_iter()
        .take(k)
        .map(|index| NodeDegree {
            node: graph.node_ids()[index].clone(),
            degree: degrees[index],
        })
        .collect()
}

fn percentage(part: usize, whole: usize) -> String {
    let share = if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    };
    format!("{:.2}%", share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CombinedGraph, TransactionGraph};

    fn graph(nodes: &[&str], edges: &[(&str, &str, u64)]) -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(nodes.iter().copied());
        for (source, target, weight) in edges {
            graph.add_edge(source, target, *weight).unwrap();
        }
        graph
    }

    #[test]
    fn test_three_node_graph() {
        let g = graph(&["A", "B", "C"], &[("A", "B", 2), ("B", "A", 1), ("B", "C", 5)]);
        let stats = GraphStatistics::compute(&g).unwrap();

        assert_eq!(stats.basics.no_nodes, 3);
        assert_eq!(stats.basics.no_edges, 3);
        assert_eq!(stats.basics.density, 0.5);
        assert_eq!(stats.paths.no_self_loops, 0);
        assert_eq!(stats.connectedness.no_weakly_connected_components, 1);
        assert_eq!(stats.connectedness.largest_weakly_connected_component, 3);
        assert_eq!(stats.connectedness.no_strongly_connected_components, 2);
        assert_eq!(stats.connectedness.largest_strongly_connected_component, 2);
        assert_eq!(
            stats.connectedness.percentage_nodes_largest_weakly_connected_component,
            "100.00%"
        );
        assert_eq!(
            stats.connectedness.percentage_nodes_largest_strongly_connected_component,
            "66.67%"
        );
    }

    #[test]
    fn test_degrees_and_ties() {
        let g = graph(&["A", "B", "C"], &[("A", "B", 2), ("B", "A", 1), ("B", "C", 5)]);
        let stats = GraphStatistics::compute(&g).unwrap();

        let plain: Vec<(&str, u64)> = stats
            .degrees
            .largest_degrees
            .iter()
            .map(|d| (d.node.as_str(), d.degree))
            .collect();
        assert_eq!(plain, vec![("B", 3), ("A", 2), ("C", 1)]);

        let weighted: Vec<(&str, u64)> = stats
            .degrees
            .largest_weighted_degrees
            .iter()
            .map(|d| (d.node.as_str(), d.degree))
            .collect();
        assert_eq!(weighted, vec![("B", 8), ("C", 5), ("A", 3)]);
        assert_eq!(stats.degrees.average_degree, 2.0);
    }

    #[test]
    fn test_top_degrees_limited_to_five_with_stable_ties() {
        let nodes = ["n0", "n1", "n2", "n3", "n4", "n5", "n6"];
        let g = graph(&nodes, &[]);
        let stats = GraphStatistics::compute(&g).unwrap();

        let names: Vec<&str> = stats
            .degrees
            .largest_degrees
            .iter()
            .map(|d| d.node.as_str())
            .collect();
        assert_eq!(names, vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[test]
    fn test_self_loop_counts_twice_in_degree() {
        let g = graph(&["A"], &[("A", "A", 4)]);
        let stats = GraphStatistics::compute(&g).unwrap();

        assert_eq!(stats.paths.no_self_loops, 1);
        assert_eq!(stats.degrees.largest_degrees[0].degree, 2);
        assert_eq!(stats.degrees.largest_weighted_degrees[0].degree, 8);
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        let err = GraphStatistics::compute(&TransactionGraph::new()).unwrap_err();
        assert!(matches!(err, GraphError::EmptyGraph { .. }));
        assert!(largest_component(&[]).is_err());
    }

    #[test]
    fn test_single_node_has_one_component_of_size_one() {
        let g = graph(&["A"], &[]);
        let stats = GraphStatistics::compute(&g).unwrap();

        assert_eq!(stats.basics.density, 0.0);
        assert_eq!(stats.connectedness.no_weakly_connected_components, 1);
        assert_eq!(stats.connectedness.largest_weakly_connected_component, 1);
        assert_eq!(stats.connectedness.largest_strongly_connected_component, 1);
    }

    #[test]
    fn test_isolated_placeholder_nodes_are_components() {
        let g = graph(&["A", "B", "C", "D"], &[("A", "B", 1), ("B", "C", 1), ("C", "A", 1)]);

        assert_eq!(weakly_connected_component_sizes(&g), vec![3, 1]);
        let mut strong = strongly_connected_component_sizes(&g);
        strong.sort_unstable();
        assert_eq!(strong, vec![1, 3]);
    }

    #[test]
    fn test_multigraph_statistics() {
        let mut combined = CombinedGraph::new();
        combined.add_node("A");
        combined.add_node("B");
        combined.add_edge("A", "B", 2018, 3).unwrap();
        combined.add_edge("A", "B", 2019, 1).unwrap();

        let stats = GraphStatistics::compute(&combined).unwrap();
        assert_eq!(stats.basics.no_edges, 2);
        assert_eq!(stats.basics.density, 1.0);
        assert_eq!(stats.degrees.largest_weighted_degrees[0].degree, 4);
    }
}
