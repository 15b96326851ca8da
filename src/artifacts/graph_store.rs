use crate::artifacts::io::{read_json, write_json_atomic};
use crate::error::{GraphError, GraphResult};
use crate::graph::{CombinedGraph, DirectedGraph, TransactionGraph};
use crate::types::{Address, GraphKind, Year};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Node-link exchange document for simple graphs and year-keyed multigraphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<Address>,
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub source: Address,
    pub target: Address,
    pub weight: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Year>,
}

impl From<&TransactionGraph> for GraphDocument {
    fn from(graph: &TransactionGraph) -> Self {
        Self {
            directed: true,
            multigraph: false,
            nodes: graph.nodes().to_vec(),
            edges: graph
                .edges()
                .map(|(source, target, weight)| EdgeDocument {
                    source: source.to_string(),
                    target: target.to_string(),
                    weight,
                    label: None,
                    route: None,
                })
                .collect(),
        }
    }
}

impl From<&CombinedGraph> for GraphDocument {
    fn from(graph: &CombinedGraph) -> Self {
        Self {
            directed: true,
            multigraph: true,
            nodes: graph.nodes().to_vec(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| EdgeDocument {
                    source: graph.node_name(edge.source).to_string(),
                    target: graph.node_name(edge.target).to_string(),
                    weight: edge.weight,
                    label: Some(edge.label()),
                    route: Some(edge.route()),
                })
                .collect(),
        }
    }
}

impl TryFrom<GraphDocument> for TransactionGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> GraphResult<Self> {
        if document.multigraph {
            return Err(GraphError::InvalidParameter(
                "expected a simple graph, found a multigraph".to_string(),
            ));
        }

        let mut graph = TransactionGraph::new();
        graph.add_nodes(document.nodes.iter().map(String::as_str));
        for edge in &document.edges {
            graph.add_edge(&edge.source, &edge.target, edge.weight)?;
        }
        Ok(graph)
    }
}

impl TryFrom<GraphDocument> for CombinedGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> GraphResult<Self> {
        let mut graph = CombinedGraph::new();
        for node in &document.nodes {
            graph.add_node(node);
        }
        for edge in &document.edges {
            let year = edge.route.ok_or_else(|| {
                GraphError::InvalidParameter(format!(
                    "multigraph edge {} -> {} has no route",
                    edge.source, edge.target
                ))
            })?;
            graph.add_edge(&edge.source, &edge.target, year, edge.weight)?;
        }
        Ok(graph)
    }
}

/// Locates and persists graphs under a graph directory
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph_dir: PathBuf,
}

impl GraphStore {
    pub fn new<P: AsRef<Path>>(graph_dir: P) -> Self {
        Self {
            graph_dir: graph_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, year: Year, kind: GraphKind) -> PathBuf {
        let file_name = match kind {
            GraphKind::Complete => format!("transactions_{}.json", year),
            GraphKind::Filtered => format!("transactions_{}_filtered.json", year),
            GraphKind::Updated => format!("updated_transactions_{}.json", year),
            GraphKind::Intersection => format!("intersection_graph_{}.json", year),
        };
        self.graph_dir.join(file_name)
    }

    pub fn combined_path(&self) -> PathBuf {
        self.graph_dir.join("multi_digraph.json")
    }

    pub fn exists(&self, year: Year, kind: GraphKind) -> bool {
        self.path_for(year, kind).exists()
    }

    pub fn save_graph(&self, year: Year, kind: GraphKind, graph: &TransactionGraph) -> Result<PathBuf> {
        let start = Instant::now();
        let path = self.path_for(year, kind);
        write_json_atomic(&path, &GraphDocument::from(graph))?;

        info!(
            "Saved {} graph for {} to {:?} in {:.2}s",
            kind,
            year,
            path,
            start.elapsed().as_secs_f64()
        );
        Ok(path)
    }

    pub fn load_graph(&self, year: Year, kind: GraphKind) -> Result<TransactionGraph> {
        let start = Instant::now();
        let path = self.path_for(year, kind);
        if !path.exists() {
            return Err(GraphError::MissingInput { year, path }.into());
        }

        let document: GraphDocument = read_json(&path)?;
        let graph = TransactionGraph::try_from(document)
            .with_context(|| format!("Invalid graph file {:?}", path))?;

        info!(
            "Loaded {} graph for {} ({} nodes, {} edges) in {:.2}s",
            kind,
            year,
            graph.node_count(),
            graph.edge_count(),
            start.elapsed().as_secs_f64()
        );
        Ok(graph)
    }

    pub fn save_combined(&self, graph: &CombinedGraph) -> Result<PathBuf> {
        let path = self.combined_path();
        write_json_atomic(&path, &GraphDocument::from(graph))?;
        info!("Saved combined graph to {:?}", path);
        Ok(path)
    }

    pub fn load_combined(&self) -> Result<CombinedGraph> {
        let path = self.combined_path();
        if !path.exists() {
            return Err(GraphError::MissingCombined { path }.into());
        }

        let document: GraphDocument = read_json(&path)?;
        let graph = CombinedGraph::try_from(document)
            .with_context(|| format!("Invalid graph file {:?}", path))?;
        info!(
            "Loaded combined graph ({} nodes, {} edges)",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }
}
