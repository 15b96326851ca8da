use crate::types::{Address, TransactionRecord, WeightedEdge};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Distinct nodes and weighted edges derived from a batch of transaction records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedEdges {
    pub nodes: Vec<Address>,
    pub edges: Vec<WeightedEdge>,
    /// Records that contributed, i.e. those with both addresses present
    pub record_count: usize,
}

impl AggregatedEdges {
    pub fn total_weight(&self) -> u64 {
        self.edges.iter().map(|edge| edge.weight).sum()
    }
}

/// Turns raw address pairs into a deduplicated, weighted edge list
pub struct EdgeAggregator;

impl EdgeAggregator {
    /// Group records by ordered address pair; the weight is the number of occurrences.
    ///
    /// Nodes come out in first-seen order over all senders followed by all receivers.
    /// Edges are sorted by descending weight with ties in first-appearance order.
    /// Records missing either address are skipped.
    pub fn aggregate<'a, I>(records: I) -> AggregatedEdges
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        let pairs: Vec<(&str, &str)> = records
            .into_iter()
            .filter_map(TransactionRecord::endpoints)
            .collect();

        let mut seen = HashSet::with_capacity(pairs.len());
        let mut nodes = Vec::new();
        for address in pairs
            .iter()
            .map(|(from, _)| *from)
            .chain(pairs.iter().map(|(_, to)| *to))
        {
            if seen.insert(address) {
                nodes.push(address.to_string());
            }
        }

        let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
        let mut edges: Vec<WeightedEdge> = Vec::new();
        for &(from, to) in &pairs {
            match positions.get(&(from, to)) {
                Some(&position) => edges[position].weight += 1,
                None => {
                    positions.insert((from, to), edges.len());
                    edges.push(WeightedEdge::new(from, to, 1));
                }
            }
        }

        edges.sort_by(|a, b| b.weight.cmp(&a.weight));

        debug!(
            "Aggregated {} records into {} nodes and {} weighted edges",
            pairs.len(),
            nodes.len(),
            edges.len()
        );

        AggregatedEdges {
            nodes,
            edges,
            record_count: pairs.len(),
        }
    }
}
