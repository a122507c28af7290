//! Training result records and their JSON form

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::labels::LabelSource;

/// Model type reported for link prediction runs
pub const LINK_PREDICTION_MODEL: &str = "GraphSAGE_LinkPred";

/// Outcome of one node classification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClassificationResult {
    pub model_type: String,
    pub graph_name: String,
    pub test_accuracy: f64,
    /// Support-weighted F1 on the test mask
    pub test_f1: f64,
    /// Distinct label values
    pub num_classes: usize,
    pub label_source: LabelSource,
    /// One entry per epoch
    pub train_losses: Vec<f64>,
    /// One entry per evaluation epoch
    pub val_accuracies: Vec<f64>,
}

/// Outcome of one link prediction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPredictionResult {
    pub model_type: String,
    pub graph_name: String,
    pub test_auc: f64,
    pub train_edges: usize,
    pub test_edges: usize,
    /// Learned node embeddings; kept in memory only
    #[serde(skip)]
    pub embeddings: Array2<f64>,
}

/// Any training result, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrainingResult {
    NodeClassification(NodeClassificationResult),
    LinkPrediction(LinkPredictionResult),
}

impl TrainingResult {
    pub fn graph_name(&self) -> &str {
        match self {
            TrainingResult::NodeClassification(r) => &r.graph_name,
            TrainingResult::LinkPrediction(r) => &r.graph_name,
        }
    }

    pub fn model_type(&self) -> &str {
        match self {
            TrainingResult::NodeClassification(r) => &r.model_type,
            TrainingResult::LinkPrediction(r) => &r.model_type,
        }
    }
}

/// Key of a node classification result and its saved model
pub fn model_key(model_type: &str, graph_name: &str) -> String {
    format!("{}_{}", model_type, graph_name)
}

/// Key of a link prediction result
pub fn link_key(graph_name: &str) -> String {
    format!("LinkPred_{}", graph_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_are_not_serialized() {
        let result = TrainingResult::LinkPrediction(LinkPredictionResult {
            model_type: LINK_PREDICTION_MODEL.to_string(),
            graph_name: "event_similarity".to_string(),
            test_auc: 0.8,
            train_edges: 10,
            test_edges: 3,
            embeddings: Array2::ones((4, 2)),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("embeddings").is_none());
        assert_eq!(json["model_type"], "GraphSAGE_LinkPred");

        let back: TrainingResult = serde_json::from_value(json).unwrap();
        assert!(matches!(back, TrainingResult::LinkPrediction(_)));
    }

    #[test]
    fn test_node_result_round_trip() {
        let result = TrainingResult::NodeClassification(NodeClassificationResult {
            model_type: "GCN".to_string(),
            graph_name: "heterogeneous".to_string(),
            test_accuracy: 0.5,
            test_f1: 0.4,
            num_classes: 3,
            label_source: LabelSource::Random { classes: 3 },
            train_losses: vec![1.0, 0.9],
            val_accuracies: vec![0.3],
        });
        let json = serde_json::to_string(&result).unwrap();
        let back: TrainingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.model_type(), "GCN");
    }

    #[test]
    fn test_keys() {
        assert_eq!(model_key("GAT", "event_similarity"), "GAT_event_similarity");
        assert_eq!(link_key("heterogeneous"), "LinkPred_heterogeneous");
    }
}
