//! Configuration management for the transaction graph pipeline

use crate::types::Year;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling: SamplingConfig,
    pub paths: PathSettings,
    pub merge: MergeSettings,
    pub years: Vec<Year>,
}

/// Dataset reduction parameters, passed explicitly to the graph builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub seed: u64,
    pub apply_filtering: bool,
    pub node_percentage: f64,
    pub edge_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub graph_dir: PathBuf,
    pub stats_file: PathBuf,
    pub intersection_file: PathBuf,
    pub union_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub strip_self_loops: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            paths: PathSettings::default(),
            merge: MergeSettings::default(),
            years: vec![2018, 2019, 2020, 2021, 2022],
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            seed: 9131,
            apply_filtering: false,
            node_percentage: 0.005,
            edge_fraction: 0.6,
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            graph_dir: PathBuf::from("graphs"),
            stats_file: PathBuf::from("numbers.json"),
            intersection_file: PathBuf::from("intersection_nodes.json"),
            union_file: PathBuf::from("union_nodes.json"),
        }
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            strip_self_loops: true,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.node_percentage > 0.0 && self.node_percentage <= 1.0) {
            return Err(anyhow::anyhow!(
                "Node percentage must be in (0, 1], got {}",
                self.node_percentage
            ));
        }

        if !(self.edge_fraction > 0.0 && self.edge_fraction <= 1.0) {
            return Err(anyhow::anyhow!(
                "Edge fraction must be in (0, 1], got {}",
                self.edge_fraction
            ));
        }

        Ok(())
    }
}

impl PipelineConfig {
    /// Load configuration from file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Override fields with `TXGRAPH_*` environment variables if present
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(seed) = std::env::var("TXGRAPH_SEED") {
            self.sampling.seed = seed.parse()?;
        }

        if let Ok(filtering) = std::env::var("TXGRAPH_APPLY_FILTERING") {
            self.sampling.apply_filtering = filtering.parse()?;
        }

        if let Ok(percentage) = std::env::var("TXGRAPH_NODE_PERCENTAGE") {
            self.sampling.node_percentage = percentage.parse()?;
        }

        if let Ok(fraction) = std::env::var("TXGRAPH_EDGE_FRACTION") {
            self.sampling.edge_fraction = fraction.parse()?;
        }

        if let Ok(data_dir) = std::env::var("TXGRAPH_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(graph_dir) = std::env::var("TXGRAPH_GRAPH_DIR") {
            self.paths.graph_dir = PathBuf::from(graph_dir);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;

        if self.years.is_empty() {
            return Err(anyhow::anyhow!("At least one year must be configured"));
        }

        let mut seen = HashSet::new();
        for year in &self.years {
            if !seen.insert(year) {
                return Err(anyhow::anyhow!("Year {} is configured more than once", year));
            }
        }

        Ok(())
    }
}
