use crate::analysis::{GraphStatistics, NodeSetOps, NodeSetSummary};
use crate::artifacts::io::{read_json, write_json_atomic};
use crate::artifacts::{GraphStore, StatsStore, TransactionSource};
use crate::config::PipelineConfig;
use crate::graph::{
    CombinedGraph, DirectedGraph, EdgeAggregator, GraphBuilder, GraphMerger, MultiYearCombiner,
    TransactionGraph,
};
use crate::types::{Address, GraphKind, Year};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

/// Per-run switches for building a yearly graph
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub filtering: bool,
    pub load_from_file: bool,
    pub save_to_file: bool,
    /// Only keep transfers whose both endpoints are in this set
    pub restrict_to: Option<HashSet<Address>>,
}

impl BuildOptions {
    /// Restricted builds get their own files and stats key; otherwise filtering decides
    pub fn kind(&self) -> GraphKind {
        if self.restrict_to.is_some() {
            GraphKind::Intersection
        } else {
            GraphKind::for_filtering(self.filtering)
        }
    }
}

/// Wires the transaction source, graph algorithms and stores together
pub struct Pipeline<S: TransactionSource> {
    config: PipelineConfig,
    source: S,
    graph_store: GraphStore,
    stats_store: StatsStore,
}

impl<S: TransactionSource> Pipeline<S> {
    pub fn new(config: PipelineConfig, source: S) -> Self {
        let graph_store = GraphStore::new(&config.paths.graph_dir);
        let stats_store = StatsStore::new(&config.paths.stats_file);

        Self {
            config,
            source,
            graph_store,
            stats_store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn graph_store(&self) -> &GraphStore {
        &self.graph_store
    }

    pub fn stats_store(&self) -> &StatsStore {
        &self.stats_store
    }

    /// Load the persisted graph when asked and available, otherwise build it from raw records
    #[instrument(skip(self, options), fields(filtering = options.filtering))]
    pub fn load_or_create_graph(&self, year: Year, options: &BuildOptions) -> Result<TransactionGraph> {
        let kind = options.kind();

        if options.load_from_file && self.graph_store.exists(year, kind) {
            return self.graph_store.load_graph(year, kind);
        }

        let start = Instant::now();
        let mut records = self.source.load_year(year)?;
        if let Some(nodes) = &options.restrict_to {
            records = GraphBuilder::restrict_to_nodes(records, nodes);
        }

        let mut sampling = self.config.sampling.clone();
        sampling.apply_filtering = options.filtering;
        let output = GraphBuilder::new(sampling)
            .from_records(&records)
            .with_context(|| format!("Failed to build graph for {}", year))?;

        info!(
            "Created graph for {} ({} nodes, {} edges) in {:.2}s",
            year,
            output.graph.node_count(),
            output.graph.edge_count(),
            start.elapsed().as_secs_f64()
        );

        if options.save_to_file {
            self.graph_store.save_graph(year, kind, &output.graph)?;
        }

        self.stats_store
            .merge_summary(&kind.stats_key(year), &output.summary)?;

        Ok(output.graph)
    }

    /// Compute statistics for `graph` and merge them into the statistics file under `key`
    pub fn compute_statistics<G: DirectedGraph>(&self, key: &str, graph: &G) -> Result<GraphStatistics> {
        let statistics = GraphStatistics::compute(graph)
            .with_context(|| format!("Failed to compute statistics for {}", key))?;
        self.stats_store.merge_statistics(key, &statistics)?;
        Ok(statistics)
    }

    fn load_complete_graphs(&self) -> Result<BTreeMap<Year, TransactionGraph>> {
        self.config
            .years
            .iter()
            .map(|&year| Ok((year, self.graph_store.load_graph(year, GraphKind::Complete)?)))
            .collect()
    }

    /// Extend one year's complete graph with the nodes of every other configured year
    #[instrument(skip(self))]
    pub fn update_year(&self, year: Year) -> Result<TransactionGraph> {
        let graphs = self.load_complete_graphs()?;
        self.update_from(year, &graphs)
    }

    /// Update every configured year, loading each complete graph only once
    pub fn update_all(&self) -> Result<BTreeMap<Year, TransactionGraph>> {
        let graphs = self.load_complete_graphs()?;

        graphs
            .keys()
            .map(|&year| Ok((year, self.update_from(year, &graphs)?)))
            .collect()
    }

    fn update_from(&self, year: Year, graphs: &BTreeMap<Year, TransactionGraph>) -> Result<TransactionGraph> {
        let base = graphs
            .get(&year)
            .cloned()
            .with_context(|| format!("Year {} is not configured", year))?;

        let merger = GraphMerger::new(self.config.merge.strip_self_loops);
        let updated = merger.merge(year, base, graphs);
        self.graph_store
            .save_graph(year, GraphKind::Updated, &updated)?;
        Ok(updated)
    }

    /// Combine the updated graphs of all configured years into one multigraph and persist it
    #[instrument(skip(self))]
    pub fn combine_years(&self) -> Result<CombinedGraph> {
        let mut updated = BTreeMap::new();
        for &year in &self.config.years {
            updated.insert(year, self.graph_store.load_graph(year, GraphKind::Updated)?);
        }

        let combined = MultiYearCombiner::combine(&updated)?;
        info!(
            "Combined {} years into {} nodes and {} edges",
            updated.len(),
            combined.node_count(),
            combined.edge_count()
        );

        self.graph_store.save_combined(&combined)?;
        Ok(combined)
    }

    /// Intersection and union of the raw node sets over all configured years, persisted as JSON
    #[instrument(skip(self))]
    pub fn node_sets(&self) -> Result<NodeSetSummary> {
        let mut node_sets = Vec::with_capacity(self.config.years.len());
        for &year in &self.config.years {
            let records = self.source.load_year(year)?;
            let aggregated = EdgeAggregator::aggregate(&records);
            info!("{} has {} distinct addresses", year, aggregated.nodes.len());
            node_sets.push(aggregated.nodes.into_iter().collect::<HashSet<Address>>());
        }

        let intersection = NodeSetOps::intersection(&node_sets)?;
        let union = NodeSetOps::union(&node_sets)?;

        write_json_atomic(&self.config.paths.intersection_file, &intersection)?;
        write_json_atomic(&self.config.paths.union_file, &union)?;

        let summary = NodeSetOps::summarize(&intersection, &union);
        info!(
            "Intersection has {} nodes, union has {} ({:.2}%)",
            summary.intersection_nodes, summary.union_nodes, summary.overlap_percentage
        );
        Ok(summary)
    }
}

/// Read a persisted node list (e.g. the intersection file) into a set
pub fn load_node_list(path: &Path) -> Result<HashSet<Address>> {
    let nodes: BTreeSet<Address> = read_json(path)?;
    Ok(nodes.into_iter().collect())
}
