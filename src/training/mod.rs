//! Training and evaluation of GNNs on event graphs

pub mod labels;
pub mod loss;
pub mod metrics;
mod optimizer;
mod results;
pub mod split;
mod trainer;

pub use labels::{cluster_count, KMeans, KMeansFit, LabelSource, NodeLabels};
pub use metrics::Metrics;
pub use optimizer::Adam;
pub use results::{
    link_key, model_key, LinkPredictionResult, NodeClassificationResult, TrainingResult,
    LINK_PREDICTION_MODEL,
};
pub use split::{EdgeSplit, NodeSplit};
pub use trainer::{GnnTrainer, PreparedGraph, RunState, TrainedModel, TrainingSummary};
