use crate::analysis::{GraphStatistics, NodeDegree, NodeSetSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Statistics of one graph, labelled with the key it is stored under
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub key: String,
    pub statistics: GraphStatistics,
    pub generated_at: DateTime<Utc>,
}

impl StatisticsReport {
    pub fn new(key: impl Into<String>, statistics: GraphStatistics) -> Self {
        Self {
            key: key.into(),
            statistics,
            generated_at: Utc::now(),
        }
    }
}

/// Report generator for creating various output formats
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Render graph statistics as `json`, `markdown` or `text`
    pub fn generate(&self, report: &StatisticsReport, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "json" => Ok(serde_json::to_string_pretty(report)?),
            "markdown" => Ok(self.statistics_markdown(report)),
            "text" => Ok(self.statistics_text(report)),
            _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
        }
    }

    pub fn generate_node_sets(&self, summary: &NodeSetSummary, format: &str) -> Result<String> {
        match format.to_lowercase().as_str() {
            "json" => Ok(serde_json::to_string_pretty(summary)?),
            "markdown" | "text" => Ok(format!(
                "Nodes present in every year: {}\nNodes present in any year: {}\nOverlap: {:.2}%\n",
                summary.intersection_nodes, summary.union_nodes, summary.overlap_percentage
            )),
            _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
        }
    }

    fn statistics_markdown(&self, report: &StatisticsReport) -> String {
        let stats = &report.statistics;
        format!(
            r#"# Graph Statistics: {}

## Basics
- **Nodes**: {}
- **Edges**: {}
- **Density**: {:.6}

## Connectedness
- **Weakly connected components**: {} (largest {}, {} of nodes)
- **Strongly connected components**: {} (largest {}, {} of nodes)

## Paths
- **Self-loops**: {}

## Degrees
- **Average degree**: {:.2}
- **Average weighted degree**: {:.2}

### Largest degrees
{}

### Largest weighted degrees
{}

---
*Generated at: {}*
"#,
            report.key,
            stats.basics.no_nodes,
            stats.basics.no_edges,
            stats.basics.density,
            stats.connectedness.no_weakly_connected_components,
            stats.connectedness.largest_weakly_connected_component,
            stats.connectedness.percentage_nodes_largest_weakly_connected_component,
            stats.connectedness.no_strongly_connected_components,
            stats.connectedness.largest_strongly_connected_component,
            stats.connectedness.percentage_nodes_largest_strongly_connected_component,
            stats.paths.no_self_loops,
            stats.degrees.average_degree,
            stats.degrees.average_weighted_degree,
            degree_list(&stats.degrees.largest_degrees, "- "),
            degree_list(&stats.degrees.largest_weighted_degrees, "- "),
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    fn statistics_text(&self, report: &StatisticsReport) -> String {
        let stats = &report.statistics;
        format!(
            r#"Graph Statistics: {}
===================

Nodes: {}
Edges: {}
Density: {:.6}
Weakly connected components: {} (largest {})
Strongly connected components: {} (largest {})
Self-loops: {}
Average degree: {:.2}
Average weighted degree: {:.2}

Largest degrees:
{}
Largest weighted degrees:
{}
Generated at: {}
"#,
            report.key,
            stats.basics.no_nodes,
            stats.basics.no_edges,
            stats.basics.density,
            stats.connectedness.no_weakly_connected_components,
            stats.connectedness.largest_weakly_connected_component,
            stats.connectedness.no_strongly_connected_components,
            stats.connectedness.largest_strongly_connected_component,
            stats.paths.no_self_loops,
            stats.degrees.average_degree,
            stats.degrees.average_weighted_degree,
            degree_list(&stats.degrees.largest_degrees, "  "),
            degree_list(&stats.degrees.largest_weighted_degrees, "  "),
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn degree_list(degrees: &[NodeDegree], bullet: &str) -> String {
    if degrees.is_empty() {
        return format!("{}None\n", bullet);
    }

    degrees
        .iter()
        .map(|entry| format!("{}{}: {}\n", bullet, entry.node, entry.degree))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransactionGraph;

    fn report() -> StatisticsReport {
        let mut graph = TransactionGraph::new();
        graph.add_nodes(["0xaa", "0xbb"]);
        graph.add_edge("0xaa", "0xbb", 4).unwrap();
        StatisticsReport::new("2019", GraphStatistics::compute(&graph).unwrap())
    }

    #[test]
    fn test_text_report_lists_top_degrees() {
        let text = ReportGenerator::new().generate(&report(), "text").unwrap();

        assert!(text.starts_with("Graph Statistics: 2019"));
        assert!(text.contains("Nodes: 2"));
        assert!(text.contains("  0xaa: 4"));
    }

    #[test]
    fn test_json_report_keeps_groups() {
        let json = ReportGenerator::new().generate(&report(), "JSON").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["key"], "2019");
        assert_eq!(value["statistics"]["basics"]["no_edges"], 1);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(ReportGenerator::new().generate(&report(), "xml").is_err());
    }

    #[test]
    fn test_node_set_summary() {
        let summary = NodeSetSummary {
            intersection_nodes: 1,
            union_nodes: 4,
            overlap_percentage: 25.0,
        };
        let text = ReportGenerator::new()
            .generate_node_sets(&summary, "text")
            .unwrap();

        assert!(text.contains("Overlap: 25.00%"));
    }
}
