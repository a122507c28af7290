//! Configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input / output locations
    pub data: DataConfig,
    /// Feature engineering configuration
    pub features: FeatureConfig,
    /// Graph construction configuration
    pub graph: GraphConfig,
    /// Model and training configuration
    pub training: TrainingConfig,
}

impl Config {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if t.num_layers < 2 {
            return Err(Error::Config(format!(
                "num_layers must be at least 2, got {}",
                t.num_layers
            )));
        }
        if !(0.0..1.0).contains(&t.dropout) {
            return Err(Error::Config(format!("dropout must be in [0, 1), got {}", t.dropout)));
        }
        if t.heads == 0 {
            return Err(Error::Config("heads must be positive".to_string()));
        }
        if t.train_ratio + t.val_ratio > 1.0 {
            return Err(Error::Config("train_ratio + val_ratio exceeds 1".to_string()));
        }
        if t.edge_val_ratio + t.edge_test_ratio >= 1.0 {
            return Err(Error::Config(
                "edge_val_ratio + edge_test_ratio must leave training edges".to_string(),
            ));
        }
        if self.features.max_text_features == 0 {
            return Err(Error::Config("max_text_features must be positive".to_string()));
        }
        Ok(())
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Explicit directory with the cleaned CSV; skips the search when set
    pub data_dir: Option<PathBuf>,
    /// Candidate directories probed in order when `data_dir` is unset
    pub search_paths: Vec<PathBuf>,
    /// Where graphs and graph metadata are written
    pub output_dir: PathBuf,
    /// Where trained models and training results are written
    pub results_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            search_paths: [
                "cleaned_data",
                "NLP_data/cleaned_data",
                "data_collection/cleaned_data",
                "data_collection/NLP_data/cleaned_data",
                "../cleaned_data",
                "../data_collection/cleaned_data",
                "../data_collection/NLP_data/cleaned_data",
                "../graph_construction/graph_data",
                "graph_construction/graph_data",
                "../../data_collection/NLP_data/cleaned_data",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            output_dir: PathBuf::from("graph_data"),
            results_dir: PathBuf::from("gnn_results"),
        }
    }
}

/// What a missing free-flag means.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FreeFlagDefault {
    /// Treat unknown events as paid (0)
    #[default]
    Paid,
    /// Treat unknown events as free (1)
    Free,
}

impl FreeFlagDefault {
    /// Numeric value used in feature columns.
    pub fn value(&self) -> f64 {
        match self {
            FreeFlagDefault::Paid => 0.0,
            FreeFlagDefault::Free => 1.0,
        }
    }
}

/// Feature engineering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Vocabulary cap for the TF-IDF block
    pub max_text_features: usize,
    /// Minimum token length
    pub min_token_length: usize,
    /// Largest n-gram size
    pub ngram_max: usize,
    /// Value used when an event has no free-flag
    pub free_flag_default: FreeFlagDefault,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_text_features: 50,
            min_token_length: 2,
            ngram_max: 2,
            free_flag_default: FreeFlagDefault::Paid,
        }
    }
}

/// Graph type produced by the constructor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    /// Event similarity graph
    EventSimilarity,
    /// Event / organizer / venue graph
    Heterogeneous,
}

impl GraphKind {
    /// Name used for files and metadata keys.
    pub fn name(&self) -> &'static str {
        match self {
            GraphKind::EventSimilarity => "event_similarity",
            GraphKind::Heterogeneous => "heterogeneous",
        }
    }
}

/// Graph construction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Initial cosine similarity threshold
    pub similarity_threshold: f64,
    /// Threshold used for the single relaxation step
    pub relaxed_threshold: f64,
    /// Edge count below which the threshold is relaxed
    pub min_edges: usize,
    /// Enable the relaxation step
    pub auto_relax: bool,
    /// Graph types to build
    pub graph_types: Vec<GraphKind>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.1,
            relaxed_threshold: 0.05,
            min_edges: 10,
            auto_relax: true,
            graph_types: vec![GraphKind::EventSimilarity, GraphKind::Heterogeneous],
        }
    }
}

/// Model and training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Node classification epochs
    pub epochs: usize,
    /// Link prediction epochs
    pub link_epochs: usize,
    /// Hidden dimension
    pub hidden_dim: usize,
    /// Embedding size for link prediction
    pub embedding_dim: usize,
    /// Number of graph layers
    pub num_layers: usize,
    /// Attention heads (GAT)
    pub heads: usize,
    /// Dropout probability
    pub dropout: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// L2 weight decay for node classification
    pub weight_decay: f64,
    /// Validation accuracy is computed every this many epochs
    pub eval_every: usize,
    /// Share of nodes used for training
    pub train_ratio: f64,
    /// Share of nodes used for validation
    pub val_ratio: f64,
    /// Share of edges held out for validation
    pub edge_val_ratio: f64,
    /// Share of edges held out for testing
    pub edge_test_ratio: f64,
    /// Architectures trained by a full run
    pub architectures: Vec<String>,
    /// Seed for every random draw in the run
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            link_epochs: 100,
            hidden_dim: 64,
            embedding_dim: 32,
            num_layers: 2,
            heads: 4,
            dropout: 0.5,
            learning_rate: 0.01,
            weight_decay: 5e-4,
            eval_every: 20,
            train_ratio: 0.6,
            val_ratio: 0.2,
            edge_val_ratio: 0.1,
            edge_test_ratio: 0.2,
            architectures: vec!["GCN".to_string(), "GAT".to_string(), "GraphSAGE".to_string()],
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.graph.similarity_threshold, 0.1);
        assert_eq!(config.features.max_text_features, 50);
        assert_eq!(config.training.epochs, 200);
        assert_eq!(config.features.free_flag_default, FreeFlagDefault::Paid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.training.epochs = 5;
        config.features.free_flag_default = FreeFlagDefault::Free;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.training.epochs, 5);
        assert_eq!(loaded.features.free_flag_default, FreeFlagDefault::Free);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[graph]\nsimilarity_threshold = 0.3\n").unwrap();
        assert_eq!(config.graph.similarity_threshold, 0.3);
        assert_eq!(config.graph.min_edges, 10);
        assert_eq!(config.training.hidden_dim, 64);
    }

    #[test]
    fn test_validate_rejects_single_layer() {
        let mut config = Config::default();
        config.training.num_layers = 1;
        assert!(config.validate().is_err());
    }
}
