//! On-disk graph storage
//!
//! Each graph is written as `<name>_graph.json` next to a shared
//! `graph_metadata.json`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{GraphData, GraphStats, HeteroGraph, HeteroStats, SimilaritySource};
use crate::error::Result;
use crate::features::{BlockKind, FeatureDimensions};

const GRAPH_SUFFIX: &str = "_graph.json";
const METADATA_FILE: &str = "graph_metadata.json";

/// Serialized graph of either kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredGraph {
    Similarity {
        graph: GraphData,
        threshold: f64,
        source: SimilaritySource,
    },
    Heterogeneous {
        graph: HeteroGraph,
    },
}

impl StoredGraph {
    /// Homogeneous view used for training
    ///
    /// Heterogeneous graphs are projected onto their events.
    pub fn training_graph(&self, name: &str) -> GraphData {
        match self {
            StoredGraph::Similarity { graph, .. } => {
                let mut graph = graph.clone();
                graph.name = name.to_string();
                graph
            }
            StoredGraph::Heterogeneous { graph } => graph.event_projection(name),
        }
    }
}

/// Statistics recorded per graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphStatistics {
    Similarity(GraphStats),
    Heterogeneous(HeteroStats),
}

/// Contents of `graph_metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub created_at: DateTime<Utc>,
    pub total_events: usize,
    pub graphs_created: Vec<String>,
    pub feature_dimensions: FeatureDimensions,
    /// Real vocabulary or the placeholder block
    #[serde(default)]
    pub textual_block: Option<BlockKind>,
    pub statistics: BTreeMap<String, GraphStatistics>,
    pub data_columns: Vec<String>,
}

/// Directory of serialized graphs
#[derive(Debug, Clone)]
pub struct GraphStore {
    dir: PathBuf,
}

impl GraphStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn graph_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, GRAPH_SUFFIX))
    }

    pub fn save_graph(&self, name: &str, graph: &StoredGraph) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.graph_path(name);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(writer, graph)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    pub fn save_metadata(&self, metadata: &GraphMetadata) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(METADATA_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, metadata)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// Metadata if present; unreadable metadata is reported and ignored
    pub fn load_metadata(&self) -> Option<GraphMetadata> {
        let path = self.dir.join(METADATA_FILE);
        if !path.exists() {
            warn!("No {} in {}, using defaults", METADATA_FILE, self.dir.display());
            return None;
        }
        match read_json(&path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn load_graph(&self, name: &str) -> Result<StoredGraph> {
        read_json(&self.graph_path(name))
    }

    /// All `*_graph.json` files, sorted by name; unreadable files are skipped
    pub fn load_graphs(&self) -> Result<Vec<(String, StoredGraph)>> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(GRAPH_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        names.sort();

        let mut graphs = Vec::new();
        for name in names {
            match self.load_graph(&name) {
                Ok(graph) => {
                    info!("Loaded graph '{}'", name);
                    graphs.push((name, graph));
                }
                Err(e) => warn!("Skipping graph '{}': {}", name, e),
            }
        }
        Ok(graphs)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
