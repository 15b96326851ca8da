use crate::analysis::GraphStatistics;
use crate::artifacts::io::{read_json, write_atomic, write_json_atomic};
use crate::types::DatasetSummary;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON file of statistics keyed by year (`2019`, `2019_filtered`, `2019_updated`, `combined`)
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents, or an empty object when the file does not exist yet
    pub fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        read_json(&self.path)
    }

    /// Set each entry under `key`, leaving other keys and other entries untouched
    pub fn merge_entries(&self, key: &str, entries: Map<String, Value>) -> Result<()> {
        let mut root = self.load()?;

        let slot = root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(existing) = slot {
            for (name, value) in entries {
                existing.insert(name, value);
            }
            existing.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        write_json_atomic(&self.path, &root)?;
        debug!("Merged statistics under '{}' into {:?}", key, self.path);
        Ok(())
    }

    pub fn merge_statistics(&self, key: &str, statistics: &GraphStatistics) -> Result<()> {
        self.merge_entries(key, to_object(statistics)?)
    }

    pub fn merge_summary(&self, key: &str, summary: &DatasetSummary) -> Result<()> {
        let mut entries = Map::new();
        entries.insert("data".to_string(), Value::Object(to_object(summary)?));
        self.merge_entries(key, entries)
    }

    /// Flatten every stored key into one CSV row; nested groups become `group.field` columns
    pub fn export_csv(&self, csv_path: &Path) -> Result<usize> {
        let root = self.load()?;

        let rows: Vec<(String, Map<String, Value>)> = root
            .into_iter()
            .map(|(key, value)| {
                let mut flat = Map::new();
                flatten("", &value, &mut flat);
                (key, flat)
            })
            .collect();

        let columns: BTreeSet<String> = rows
            .iter()
            .flat_map(|(_, flat)| flat.keys().cloned())
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["year".to_string()];
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for (key, flat) in &rows {
            let mut record = vec![key.clone()];
            record.extend(columns.iter().map(|column| match flat.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            }));
            writer.write_record(&record)?;
        }

        let content = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish CSV output: {}", e))?;
        write_atomic(csv_path, &content)?;

        info!("Exported {} statistics rows to {:?}", rows.len(), csv_path);
        Ok(rows.len())
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value).context("Failed to serialize statistics")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!("Expected a JSON object, got {}", other)),
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (name, inner) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                flatten(&key, inner, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransactionGraph;
    use serde_json::json;
    use tempfile::TempDir;

    fn statistics() -> GraphStatistics {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(["A", "B"]);
        graph.add_edge("A", "B", 3).unwrap();
        GraphStatistics::compute(&graph).unwrap()
    }

    #[test]
    fn test_merge_preserves_other_keys_and_groups() {
        let temp_dir = TempDir::new().unwrap();
        let store = StatsStore::new(temp_dir.path().join("numbers.json"));

        store
            .merge_summary("2018", &DatasetSummary::compute(10, 10, 4, 5, false))
            .unwrap();
        store.merge_statistics("2018", &statistics()).unwrap();
        store.merge_statistics("2019_filtered", &statistics()).unwrap();

        let root = store.load().unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["2018", "2019_filtered"]);

        let year = root["2018"].as_object().unwrap();
        assert_eq!(year["data"]["percentage_unique_edges"], json!("50.00%"));
        assert_eq!(year["basics"]["no_nodes"], json!(2));
        assert_eq!(
            year["connectedness"]["percentage_nodes_largest_weakly_connected_component"],
            json!("100.00%")
        );
        assert!(year.contains_key("updated_at"));
        assert!(!root["2019_filtered"].as_object().unwrap().contains_key("data"));
    }

    #[test]
    fn test_merge_overwrites_same_group() {
        let temp_dir = TempDir::new().unwrap();
        let store = StatsStore::new(temp_dir.path().join("numbers.json"));

        let mut first = Map::new();
        first.insert("paths".to_string(), json!({"no_self_loops": 4}));
        store.merge_entries("2020", first).unwrap();

        let mut second = Map::new();
        second.insert("paths".to_string(), json!({"no_self_loops": 0}));
        store.merge_entries("2020", second).unwrap();

        let root = store.load().unwrap();
        assert_eq!(root["2020"]["paths"]["no_self_loops"], json!(0));
    }

    #[test]
    fn test_export_csv() {
        let temp_dir = TempDir::new().unwrap();
        let store = StatsStore::new(temp_dir.path().join("numbers.json"));
        store.merge_statistics("2018", &statistics()).unwrap();
        store.merge_statistics("2018_updated", &statistics()).unwrap();

        let csv_path = temp_dir.path().join("yearly_graph_stats.csv");
        assert_eq!(store.export_csv(&csv_path).unwrap(), 2);

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("year,"));
        assert!(header.contains("basics.no_nodes"));
        assert!(header.contains("degrees.largest_degrees"));
        assert!(lines.next().unwrap().starts_with("2018,"));
        assert!(lines.next().unwrap().starts_with("2018_updated,"));
    }
}
