use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use txgraph::{
    artifacts::CsvTransactionSource,
    config::PipelineConfig,
    graph::DirectedGraph,
    pipeline::{load_node_list, BuildOptions, Pipeline},
    reports::{ReportGenerator, StatisticsReport},
    types::{GraphKind, Year},
};

#[derive(Parser)]
#[command(name = "txgraph")]
#[command(about = "Build, merge and analyse yearly crypto transaction graphs")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build yearly graphs from raw transactions
    Build {
        /// Year to build (defaults to every configured year)
        #[arg(short, long)]
        year: Option<Year>,

        /// Sample nodes and records before building
        #[arg(short, long)]
        filter: bool,

        /// Reuse a previously saved graph when one exists
        #[arg(long)]
        load: bool,

        /// Save the built graph; prompts when omitted on a terminal
        #[arg(short, long)]
        save: Option<YesNo>,

        /// Keep only transfers between addresses present in every year
        #[arg(long)]
        intersection_only: bool,

        /// Compute and store statistics for each built graph
        #[arg(long)]
        stats: bool,
    },

    /// Extend each complete yearly graph with the nodes of all other years
    Update {
        /// Year to update (defaults to every configured year)
        #[arg(short, long)]
        year: Option<Year>,
    },

    /// Combine the updated yearly graphs into one multigraph
    Combine,

    /// Compute statistics for a stored graph
    Stats {
        /// Year of the graph (ignored for the combined graph)
        #[arg(short, long)]
        year: Option<Year>,

        /// Which stored graph to analyse
        #[arg(short, long, value_enum, default_value = "complete")]
        kind: StatsTarget,

        /// Output format (json, markdown, text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Compute the intersection and union of yearly node sets
    NodeSets {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Flatten the statistics file into a CSV table
    ExportCsv {
        #[arg(short, long, default_value = "yearly_graph_stats.csv")]
        output: PathBuf,
    },

    /// List years with transaction data in the data directory
    Years,

    /// Initialize configuration file
    Init {
        /// Configuration file path
        #[arg(short, long, default_value = "txgraph.yml")]
        config_file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StatsTarget {
    Complete,
    Filtered,
    Updated,
    Intersection,
    Combined,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level)?;

    let config = load_config(cli.config.as_ref()).await?;
    let source = CsvTransactionSource::new(&config.paths.data_dir);

    match cli.command {
        Commands::Build {
            year,
            filter,
            load,
            save,
            intersection_only,
            stats,
        } => {
            let save_to_file = match save {
                Some(answer) => answer == YesNo::Yes,
                None if io::stdin().is_terminal() => prompt_save()?,
                None => false,
            };
            let restrict_to = if intersection_only {
                Some(load_node_list(&config.paths.intersection_file).with_context(|| {
                    "Intersection nodes not found, run `txgraph node-sets` first"
                })?)
            } else {
                None
            };
            let options = BuildOptions {
                filtering: filter,
                load_from_file: load,
                save_to_file,
                restrict_to,
            };

            let years = selected_years(&config, year);
            let pipeline = Pipeline::new(config, source);
            for year in years {
                let graph = pipeline.load_or_create_graph(year, &options)?;
                println!(
                    "{}: {} nodes, {} edges",
                    year,
                    graph.node_count(),
                    graph.edge_count()
                );
                if stats {
                    let key = options.kind().stats_key(year);
                    pipeline.compute_statistics(&key, &graph)?;
                }
            }
        }

        Commands::Update { year } => {
            let pipeline = Pipeline::new(config, source);
            match year {
                Some(year) => {
                    let graph = pipeline.update_year(year)?;
                    println!("{}: {} nodes, {} edges", year, graph.node_count(), graph.edge_count());
                }
                None => {
                    for (year, graph) in pipeline.update_all()? {
                        println!("{}: {} nodes, {} edges", year, graph.node_count(), graph.edge_count());
                    }
                }
            }
        }

        Commands::Combine => {
            let pipeline = Pipeline::new(config, source);
            let combined = pipeline.combine_years()?;
            println!(
                "Combined graph: {} nodes, {} edges",
                combined.node_count(),
                combined.edge_count()
            );
        }

        Commands::Stats { year, kind, output } => {
            let pipeline = Pipeline::new(config, source);
            let store = pipeline.graph_store();

            let (key, statistics) = match (kind, year) {
                (StatsTarget::Combined, _) => {
                    let graph = store.load_combined()?;
                    let key = "combined".to_string();
                    let statistics = pipeline.compute_statistics(&key, &graph)?;
                    (key, statistics)
                }
                (target, Some(year)) => {
                    let kind = match target {
                        StatsTarget::Filtered => GraphKind::Filtered,
                        StatsTarget::Updated => GraphKind::Updated,
                        StatsTarget::Intersection => GraphKind::Intersection,
                        _ => GraphKind::Complete,
                    };
                    let graph = store.load_graph(year, kind)?;
                    let key = kind.stats_key(year);
                    let statistics = pipeline.compute_statistics(&key, &graph)?;
                    (key, statistics)
                }
                (_, None) => {
                    return Err(anyhow::anyhow!("--year is required for yearly graphs"));
                }
            };

            let report = StatisticsReport::new(key, statistics);
            println!("{}", ReportGenerator::new().generate(&report, &output)?);
        }

        Commands::NodeSets { output } => {
            let pipeline = Pipeline::new(config, source);
            let summary = pipeline.node_sets()?;
            println!(
                "{}",
                ReportGenerator::new().generate_node_sets(&summary, &output)?
            );
        }

        Commands::ExportCsv { output } => {
            let pipeline = Pipeline::new(config, source);
            let rows = pipeline.stats_store().export_csv(&output)?;
            println!("Wrote {} rows to {:?}", rows, output);
        }

        Commands::Years => {
            let years = source.available_years()?;
            if years.is_empty() {
                warn!("No transaction files found in {:?}", config.paths.data_dir);
            }
            for year in years {
                let marker = if config.years.contains(&year) { "" } else { " (not configured)" };
                println!("{}{}", year, marker);
            }
        }

        Commands::Init { config_file } => {
            init_config(&config_file).await?;
        }
    }

    Ok(())
}

/// Initialize tracing with the specified log level
fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

/// Load configuration from file or use defaults, then apply environment overrides
async fn load_config(config_path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {:?}", path);
            PipelineConfig::load_from_file(path)
                .await
                .with_context(|| format!("Failed to load configuration file: {:?}", path))?
        }
        Some(path) => {
            warn!("Configuration file not found: {:?}. Using defaults.", path);
            PipelineConfig::default()
        }
        None => PipelineConfig::default(),
    };

    config
        .apply_env_overrides()
        .context("Invalid TXGRAPH_* environment variable")?;
    config.validate()?;
    Ok(config)
}

fn selected_years(config: &PipelineConfig, year: Option<Year>) -> Vec<Year> {
    match year {
        Some(year) => vec![year],
        None => config.years.clone(),
    }
}

fn prompt_save() -> Result<bool> {
    print!("Save graph to file? (Y/n): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(parse_save_answer(&input))
}

/// Empty input means yes
fn parse_save_answer(input: &str) -> bool {
    !input.trim().to_lowercase().starts_with('n')
}

/// Write the default configuration, refusing to overwrite an existing file without confirmation
async fn init_config(config_file: &Path) -> Result<()> {
    info!("Initializing configuration file: {:?}", config_file);

    if config_file.exists() {
        warn!("Configuration file already exists: {:?}", config_file);
        print!("Overwrite existing file? (y/N): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().to_lowercase().starts_with('y') {
            info!("Configuration initialization cancelled");
            return Ok(());
        }
    }

    PipelineConfig::default()
        .save_to_file(config_file)
        .await
        .with_context(|| format!("Failed to write configuration file: {:?}", config_file))?;

    println!("Configuration file created: {:?}", config_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_save_answer() {
        assert!(parse_save_answer("\n"));
        assert!(parse_save_answer("Y\n"));
        assert!(parse_save_answer("yes"));
        assert!(!parse_save_answer("n\n"));
        assert!(!parse_save_answer(" No "));
    }

    #[test]
    fn test_build_arguments() {
        let cli = Cli::try_parse_from(["txgraph", "build", "--year", "2019", "--filter", "--save", "no"])
            .unwrap();

        match cli.command {
            Commands::Build {
                year, filter, save, ..
            } => {
                assert_eq!(year, Some(2019));
                assert!(filter);
                assert_eq!(save, Some(YesNo::No));
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_init_then_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("txgraph.yml");

        tokio_test::block_on(init_config(&path)).unwrap();
        let config = tokio_test::block_on(load_config(Some(&path))).unwrap();

        assert_eq!(config.sampling.seed, PipelineConfig::default().sampling.seed);
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let path = PathBuf::from("does-not-exist.yml");
        let config = tokio_test::block_on(load_config(Some(&path))).unwrap();

        assert_eq!(config.years, PipelineConfig::default().years);
    }

    #[test]
    fn test_selected_years() {
        let config = PipelineConfig::default();
        assert_eq!(selected_years(&config, Some(2020)), vec![2020]);
        assert_eq!(selected_years(&config, None).len(), 5);
    }
}
