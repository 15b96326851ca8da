//! Core types shared by the graph pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Blockchain account identifier, kept exactly as it appears in the source data
pub type Address = String;

pub type Year = u16;

/// One transfer between two addresses. Either side may be missing in the raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: Option<Address>,
    pub to: Option<Address>,
}

impl TransactionRecord {
    pub fn new(from: impl Into<Address>, to: impl Into<Address>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    /// Both endpoints, or `None` when either address is missing
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub source: Address,
    pub target: Address,
    pub weight: u64,
}

impl WeightedEdge {
    pub fn new(source: impl Into<Address>, target: impl Into<Address>, weight: u64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }
}

/// Which variant of a yearly graph is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Complete,
    Filtered,
    Updated,
    /// Built only from transfers between addresses active in every year
    Intersection,
}

impl GraphKind {
    pub fn for_filtering(filtering: bool) -> Self {
        if filtering {
            GraphKind::Filtered
        } else {
            GraphKind::Complete
        }
    }

    /// Key under which statistics for this graph are stored
    pub fn stats_key(&self, year: Year) -> String {
        match self {
            GraphKind::Complete => format!("{}", year),
            GraphKind::Filtered => format!("{}_filtered", year),
            GraphKind::Updated => format!("{}_updated", year),
            GraphKind::Intersection => format!("{}_intersection", year),
        }
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphKind::Complete => write!(f, "complete"),
            GraphKind::Filtered => write!(f, "filtered"),
            GraphKind::Updated => write!(f, "updated"),
            GraphKind::Intersection => write!(f, "intersection"),
        }
    }
}

/// Shape of the transaction data a graph was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_data_used: Option<String>,
    pub percentage_unique_nodes: String,
    pub percentage_unique_edges: String,
    pub mean_edges_per_node: String,
}

impl DatasetSummary {
    /// `total_records` is the valid record count before sampling, `used_records` after it.
    pub fn compute(
        total_records: usize,
        used_records: usize,
        unique_nodes: usize,
        unique_edges: usize,
        sampled: bool,
    ) -> Self {
        let ratio = |numerator: usize, denominator: usize| {
            if denominator == 0 {
                0.0
            } else {
                numerator as f64 / denominator as f64
            }
        };

        Self {
            percentage_data_used: sampled
                .then(|| format!("{:.2}%", ratio(used_records, total_records) * 100.0)),
            percentage_unique_nodes: format!("{:.2}%", ratio(unique_nodes, used_records) * 100.0),
            percentage_unique_edges: format!("{:.2}%", ratio(unique_edges, used_records) * 100.0),
            mean_edges_per_node: format!("{:.2}", ratio(used_records, unique_nodes)),
        }
    }
}
