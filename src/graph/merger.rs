use crate::graph::transaction_graph::{DirectedGraph, TransactionGraph};
use crate::types::Year;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Extends a year's graph with placeholder nodes for addresses seen only in other years
#[derive(Debug, Clone)]
pub struct GraphMerger {
    strip_self_loops: bool,
}

impl GraphMerger {
    pub fn new(strip_self_loops: bool) -> Self {
        Self { strip_self_loops }
    }

    /// Union the node sets of `others` into `base` without copying any of their edges.
    ///
    /// Other years are visited in ascending order; the entry for `base_year` itself is skipped.
    pub fn merge(
        &self,
        base_year: Year,
        mut base: TransactionGraph,
        others: &BTreeMap<Year, TransactionGraph>,
    ) -> TransactionGraph {
        for (year, other) in others {
            if *year == base_year {
                continue;
            }

            let new_nodes: Vec<&str> = other
                .nodes()
                .iter()
                .map(String::as_str)
                .filter(|address| !base.contains_node(address))
                .collect();

            debug!(
                "Updating {} graph with {} nodes from {}",
                base_year,
                new_nodes.len(),
                year
            );
            base.add_nodes(new_nodes);
        }

        if self.strip_self_loops {
            let removed = base.remove_self_loops();
            debug!("Removed {} self-loops from {} graph", removed, base_year);
        }

        info!(
            "Updated {} graph: {} nodes, {} edges",
            base_year,
            base.node_count(),
            base.edge_count()
        );
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn graph(nodes: &[&str], edges: &[(&str, &str, u64)]) -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(nodes.iter().copied());
        for (source, target, weight) in edges {
            graph.add_edge(source, target, *weight).unwrap();
        }
        graph
    }

    fn yearly_graphs() -> BTreeMap<Year, TransactionGraph> {
        let mut graphs = BTreeMap::new();
        graphs.insert(2018, graph(&["a", "b"], &[("a", "b", 3), ("b", "b", 1)]));
        graphs.insert(2019, graph(&["b", "c"], &[("b", "c", 2)]));
        graphs.insert(2020, graph(&["d", "a"], &[("d", "a", 7)]));
        graphs
    }

    #[test]
    fn test_merge_unions_nodes_keeps_base_edges() {
        let graphs = yearly_graphs();
        let merged = GraphMerger::new(false).merge(2018, graphs[&2018].clone(), &graphs);

        let expected: HashSet<&str> = ["a", "b", "c", "d"].into_iter().collect();
        assert_eq!(merged.node_set(), expected);
        assert_eq!(merged.edge_count(), 2);
        assert_eq!(merged.edge_weight("a", "b"), Some(3));
        assert_eq!(merged.edge_weight("b", "b"), Some(1));
        assert_eq!(merged.edge_weight("b", "c"), None);
    }

    #[test]
    fn test_merge_strips_self_loops() {
        let graphs = yearly_graphs();
        let merged = GraphMerger::new(true).merge(2018, graphs[&2018].clone(), &graphs);

        assert_eq!(merged.edge_count(), 1);
        assert_eq!(merged.self_loop_count(), 0);
        assert!(merged.contains_node("b"));
    }

    #[test]
    fn test_every_year_gets_the_same_node_set() {
        let graphs = yearly_graphs();
        let merger = GraphMerger::new(true);

        let node_sets: Vec<HashSet<String>> = graphs
            .iter()
            .map(|(year, base)| {
                merger
                    .merge(*year, base.clone(), &graphs)
                    .nodes()
                    .iter()
                    .cloned()
                    .collect()
            })
            .collect();

        assert!(node_sets.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(node_sets[0].len(), 4);
    }

    #[test]
    fn test_merge_with_no_other_years() {
        let base = graph(&["a"], &[]);
        let merged = GraphMerger::new(true).merge(2018, base, &BTreeMap::new());

        assert_eq!(merged.node_count(), 1);
    }
}
