//! CLI for event graph construction and GNN training.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_gnn::{pipeline::GraphConstructor, training::GnnTrainer, utils::Config};

#[derive(Parser)]
#[command(name = "event-gnn")]
#[command(about = "Event graph construction and graph neural network training")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults are used when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build similarity and heterogeneous graphs from the event CSV
    Construct {
        /// Directory holding the cleaned event CSV (skips the search)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Where graphs and metadata are written
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Train GNNs on previously built graphs
    Train {
        /// Directory with *_graph.json files
        #[arg(short, long)]
        graph_dir: Option<PathBuf>,

        /// Where models and training_results.json are written
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Train only this graph (falls back to the first one if unknown)
        #[arg(long)]
        graph: Option<String>,
    },

    /// Construct graphs, then train on them
    Run {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter("event_gnn=info"))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Construct {
            data_dir,
            output_dir,
        } => {
            if let Some(dir) = data_dir {
                config.data.data_dir = Some(dir);
            }
            if let Some(dir) = output_dir {
                config.data.output_dir = dir;
            }
            construct(&config)?;
        }

        Commands::Train {
            graph_dir,
            output_dir,
            graph,
        } => {
            if let Some(dir) = graph_dir {
                config.data.output_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.data.results_dir = dir;
            }
            train(&config, graph.as_deref())?;
        }

        Commands::Run { data_dir } => {
            if let Some(dir) = data_dir {
                config.data.data_dir = Some(dir);
            }
            construct(&config)?;
            train(&config, None)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` when set and valid, `default` otherwise
fn log_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn construct(config: &Config) -> Result<()> {
    info!("Constructing event graphs");
    let report = GraphConstructor::new(config.clone())
        .run()
        .context("graph construction failed")?;
    report.print_summary();
    Ok(())
}

fn train(config: &Config, graph: Option<&str>) -> Result<()> {
    info!("Training GNNs on graphs in {}", config.data.output_dir.display());
    let mut trainer = GnnTrainer::new(
        config.training.clone(),
        &config.data.output_dir,
        &config.data.results_dir,
    );

    let summary = match graph {
        Some(name) => {
            trainer.load_graphs().context("loading graphs")?;
            for model_type in &config.training.architectures {
                if let Err(e) = trainer.train_node_classification(name, model_type) {
                    tracing::error!("{} on '{}' failed: {}", model_type, name, e);
                }
            }
            if let Err(e) = trainer.train_link_prediction(name) {
                tracing::error!("Link prediction on '{}' failed: {}", name, e);
            }
            trainer.save_results().context("saving results")?;
            trainer.summary()
        }
        None => trainer.run_full_training().context("training failed")?,
    };
    summary.print_summary();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_filter() {
        std::env::set_var("RUST_LOG", "event_gnn=debug");
        assert_eq!(log_filter("event_gnn=info").to_string().to_lowercase(), "event_gnn=debug");

        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter("event_gnn=info").to_string().to_lowercase(), "event_gnn=info");
    }
}
