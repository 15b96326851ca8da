use crate::error::{GraphError, GraphResult};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Sizes of the cross-year node sets and how much of the union every year shares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSetSummary {
    pub intersection_nodes: usize,
    pub union_nodes: usize,
    pub overlap_percentage: f64,
}

/// Set algebra over the yearly node sets
pub struct NodeSetOps;

impl NodeSetOps {
    /// Addresses present in every set, sorted
    pub fn intersection(node_sets: &[HashSet<Address>]) -> GraphResult<BTreeSet<Address>> {
        let (first, rest) = node_sets.split_first().ok_or_else(|| {
            GraphError::InvalidParameter("intersection needs at least one node set".to_string())
        })?;

        Ok(first
            .iter()
            .filter(|address| rest.iter().all(|set| set.contains(*address)))
            .cloned()
            .collect())
    }

    /// Addresses present in any set, sorted
    pub fn union(node_sets: &[HashSet<Address>]) -> GraphResult<BTreeSet<Address>> {
        if node_sets.is_empty() {
            return Err(GraphError::InvalidParameter(
                "union needs at least one node set".to_string(),
            ));
        }

        Ok(node_sets.iter().flatten().cloned().collect())
    }

    pub fn summarize(intersection: &BTreeSet<Address>, union: &BTreeSet<Address>) -> NodeSetSummary {
        let overlap_percentage = if union.is_empty() {
            0.0
        } else {
            intersection.len() as f64 / union.len() as f64 * 100.0
        };

        NodeSetSummary {
            intersection_nodes: intersection.len(),
            union_nodes: union.len(),
            overlap_percentage,
        }
    }
}
