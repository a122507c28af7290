//! # Event Graphs and Graph Neural Networks
//!
//! Builds graphs over event listings (concerts, films, meetups) and trains
//! graph neural networks on them.
//!
//! ## Modules
//!
//! - `data` - Event table schema, CSV loading and dataset discovery
//! - `features` - TF-IDF, label encoding and scaled numeric statistics
//! - `graph` - Similarity and heterogeneous graph builders, JSON storage
//! - `gnn` - GCN, GAT and GraphSAGE layers with hand-written backprop
//! - `training` - Node classification and link prediction
//! - `pipeline` - End-to-end graph construction run
//! - `utils` - Configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use event_gnn::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = Config::default();
//!
//!     // Locate the CSV, engineer features, build and save both graphs
//!     let report = GraphConstructor::new(config.clone()).run()?;
//!     report.print_summary();
//!
//!     // Train GCN / GAT / GraphSAGE on every saved graph
//!     let mut trainer = GnnTrainer::new(
//!         config.training.clone(),
//!         &config.data.output_dir,
//!         &config.data.results_dir,
//!     );
//!     trainer.run_full_training()?.print_summary();
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod features;
pub mod gnn;
pub mod graph;
pub mod pipeline;
pub mod training;
pub mod utils;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{Column, ColumnSet, DataLoader, DatasetLocator, EventRecord, EventTable};
    pub use crate::error::{Error, Result};
    pub use crate::features::{BlockKind, FeatureDimensions, FeatureEngineer, FeatureSet};
    pub use crate::gnn::{Architecture, GnnModel, ModelConfig};
    pub use crate::graph::{
        EdgeType, GraphData, GraphMetadata, GraphStore, HeteroGraph, HeterogeneousGraphBuilder,
        NodeType, SimilarityGraph, SimilarityGraphBuilder, SimilaritySource, StoredGraph,
    };
    pub use crate::pipeline::{GraphConstructor, Outcome, RunReport};
    pub use crate::training::{
        GnnTrainer, LabelSource, LinkPredictionResult, Metrics, NodeClassificationResult,
        TrainingResult,
    };
    pub use crate::utils::{Config, GraphKind};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
