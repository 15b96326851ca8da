pub mod aggregator;
pub mod builder;
pub mod combiner;
pub mod merger;
pub mod transaction_graph;

pub use aggregator::{AggregatedEdges, EdgeAggregator};
pub use builder::{BuildOutput, GraphBuilder};
pub use combiner::{CombinedGraph, MultiYearCombiner, YearEdge};
pub use merger::GraphMerger;
pub use transaction_graph::{DirectedGraph, TransactionGraph};
