use crate::config::SamplingConfig;
use crate::error::{GraphError, GraphResult};
use crate::graph::aggregator::EdgeAggregator;
use crate::graph::transaction_graph::{DirectedGraph, TransactionGraph};
use crate::types::{Address, DatasetSummary, TransactionRecord, WeightedEdge};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{debug, info};

/// A freshly built graph together with a summary of the data behind it
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: TransactionGraph,
    pub summary: DatasetSummary,
}

/// Builds directed weighted graphs from transaction records, optionally sampling them first
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    sampling: SamplingConfig,
}

impl GraphBuilder {
    pub fn new(sampling: SamplingConfig) -> Self {
        Self { sampling }
    }

    /// Build a graph from a node list and an already aggregated edge list.
    ///
    /// Duplicate nodes collapse. Every edge endpoint must appear in `nodes`.
    pub fn build(nodes: &[Address], edges: &[WeightedEdge]) -> GraphResult<TransactionGraph> {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(nodes.iter().map(String::as_str));

        for edge in edges {
            graph.add_edge(&edge.source, &edge.target, edge.weight)?;
        }

        debug!(
            "Built graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Aggregate records (after sampling, when enabled) and build the resulting graph
    pub fn from_records(&self, records: &[TransactionRecord]) -> GraphResult<BuildOutput> {
        let valid: Vec<&TransactionRecord> = records
            .iter()
            .filter(|record| record.endpoints().is_some())
            .collect();

        let used = if self.sampling.apply_filtering {
            let sampled = self.sample_records(&valid)?;
            info!(
                "Filtering applied: using {} of {} records ({:.2}%)",
                sampled.len(),
                valid.len(),
                sampled.len() as f64 / valid.len() as f64 * 100.0
            );
            sampled
        } else {
            valid.clone()
        };

        let aggregated = EdgeAggregator::aggregate(used.iter().copied());
        let graph = Self::build(&aggregated.nodes, &aggregated.edges)?;

        let summary = DatasetSummary::compute(
            valid.len(),
            aggregated.record_count,
            aggregated.nodes.len(),
            aggregated.edges.len(),
            self.sampling.apply_filtering,
        );

        Ok(BuildOutput { graph, summary })
    }

    /// Reduce a record set: draw a node subset without replacement, keep records touching
    /// a drawn node, then keep a uniform fraction of those records.
    ///
    /// The kept records stay in their input order so aggregation remains deterministic.
    pub fn sample_records<'a>(
        &self,
        records: &[&'a TransactionRecord],
    ) -> GraphResult<Vec<&'a TransactionRecord>> {
        let mut rng = StdRng::seed_from_u64(self.sampling.seed);

        let aggregated = EdgeAggregator::aggregate(records.iter().copied());
        let nodes = aggregated.nodes;

        let node_sample_size =
            sample_size_ceil(nodes.len(), self.sampling.node_percentage).min(nodes.len());
        if node_sample_size == 0 {
            return Err(GraphError::DegenerateSample {
                total_nodes: nodes.len(),
                node_percentage: self.sampling.node_percentage,
            });
        }

        let sampled_nodes: HashSet<&str> = index::sample(&mut rng, nodes.len(), node_sample_size)
            .iter()
            .map(|position| nodes[position].as_str())
            .collect();

        let touching: Vec<&'a TransactionRecord> = records
            .iter()
            .copied()
            .filter(|record| match record.endpoints() {
                Some((from, to)) => sampled_nodes.contains(from) || sampled_nodes.contains(to),
                None => false,
            })
            .collect();

        let record_sample_size =
            ((touching.len() as f64) * self.sampling.edge_fraction).round() as usize;
        let record_sample_size = record_sample_size.min(touching.len());
        if record_sample_size == 0 {
            return Err(GraphError::DegenerateEdgeSample {
                total_records: touching.len(),
                edge_fraction: self.sampling.edge_fraction,
            });
        }

        let mut kept = index::sample(&mut rng, touching.len(), record_sample_size).into_vec();
        kept.sort_unstable();

        debug!(
            "Sampled {} nodes, {} touching records, kept {}",
            sampled_nodes.len(),
            touching.len(),
            kept.len()
        );

        Ok(kept.into_iter().map(|position| touching[position]).collect())
    }

    /// Keep only records whose sender and receiver both belong to `nodes`
    pub fn restrict_to_nodes(
        records: Vec<TransactionRecord>,
        nodes: &HashSet<Address>,
    ) -> Vec<TransactionRecord> {
        let before = records.len();
        let restricted: Vec<TransactionRecord> = records
            .into_iter()
            .filter(|record| match record.endpoints() {
                Some((from, to)) => nodes.contains(from) && nodes.contains(to),
                None => false,
            })
            .collect();

        info!(
            "Restricted {} records to {} within a set of {} nodes",
            before,
            restricted.len(),
            nodes.len()
        );
        restricted
    }
}

/// `ceil(total * fraction)`, ignoring floating point noise just above an integer
fn sample_size_ceil(total: usize, fraction: f64) -> usize {
    let raw = total as f64 * fraction;
    let rounded = raw.round();
    if (raw - rounded).abs() < 1e-9 {
        rounded as usize
    } else {
        raw.ceil() as usize
    }
}
