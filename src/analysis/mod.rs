pub mod node_sets;
pub mod statistics;

pub use node_sets::{NodeSetOps, NodeSetSummary};
pub use statistics::{GraphStatistics, NodeDegree};
