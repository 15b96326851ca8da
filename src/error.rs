use crate::types::Year;
use std::path::PathBuf;
use thiserror::Error;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Domain errors raised by graph construction and analysis
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Cannot compute {operation} on a graph with zero nodes")]
    EmptyGraph { operation: &'static str },

    #[error("Sampling {node_percentage} of {total_nodes} nodes selects no nodes")]
    DegenerateSample { total_nodes: usize, node_percentage: f64 },

    #[error("Sampling {edge_fraction} of {total_records} filtered records selects no records")]
    DegenerateEdgeSample { total_records: usize, edge_fraction: f64 },

    #[error("Edge {edge_source} -> {edge_target} references unknown node {node}")]
    UnknownNode {
        node: String,
        edge_source: String,
        edge_target: String,
    },

    #[error("No input for year {year} at {path:?}")]
    MissingInput { year: Year, path: PathBuf },

    #[error("No combined graph at {path:?}, run the combine step first")]
    MissingCombined { path: PathBuf },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
