//! GNN trainer: node classification and link prediction over stored graphs

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::labels::NodeLabels;
use super::loss::{bce_with_logits, cross_entropy};
use super::metrics::Metrics;
use super::optimizer::Adam;
use super::results::{
    link_key, model_key, LinkPredictionResult, NodeClassificationResult, TrainingResult,
    LINK_PREDICTION_MODEL,
};
use super::split::{random_pairs, EdgeSplit, NodeSplit};
use crate::error::{Error, Result};
use crate::gnn::{Architecture, GnnModel, ModelConfig};
use crate::graph::{Adjacency, GraphData, GraphMetadata, GraphStore};
use crate::utils::TrainingConfig;

const MODELS_DIR: &str = "models";
const RESULTS_FILE: &str = "training_results.json";

/// Lifecycle of a node classification model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Untrained,
    Training,
    Evaluated,
    Persisted,
}

impl RunState {
    fn advance(self) -> Self {
        let next = match self {
            RunState::Untrained => RunState::Training,
            RunState::Training => RunState::Evaluated,
            RunState::Evaluated | RunState::Persisted => RunState::Persisted,
        };
        debug!("Model state {:?} -> {:?}", self, next);
        next
    }
}

/// A model kept by the trainer together with its lifecycle state
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: GnnModel,
    pub state: RunState,
}

/// Labels and masks prepared for one graph
#[derive(Debug, Clone)]
pub struct PreparedGraph {
    /// Resolved graph name, after any fallback
    pub graph_name: String,
    pub labels: NodeLabels,
    pub split: NodeSplit,
}

/// Aggregate view of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub graphs_analyzed: Vec<String>,
    pub node_runs: usize,
    pub link_runs: usize,
    pub avg_accuracy: Option<f64>,
    pub avg_auc: Option<f64>,
}

impl TrainingSummary {
    pub fn print_summary(&self) {
        println!("=== GNN Training Summary ===");
        println!("Graphs analyzed: {}", self.graphs_analyzed.join(", "));
        println!("Node classification runs: {}", self.node_runs);
        println!("Link prediction runs: {}", self.link_runs);
        match self.avg_accuracy {
            Some(acc) => println!("Average accuracy: {:.4}", acc),
            None => println!("Average accuracy: n/a"),
        }
        match self.avg_auc {
            Some(auc) => println!("Average AUC: {:.4}", auc),
            None => println!("Average AUC: n/a"),
        }
    }
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} graphs, {} node runs, {} link runs",
            self.graphs_analyzed.len(),
            self.node_runs,
            self.link_runs
        )
    }
}

/// Trains GNNs on graphs loaded from a [`GraphStore`] or added directly
pub struct GnnTrainer {
    config: TrainingConfig,
    store: GraphStore,
    output_dir: PathBuf,
    metadata: Option<GraphMetadata>,
    graphs: Vec<GraphData>,
    models: BTreeMap<String, TrainedModel>,
    results: BTreeMap<String, TrainingResult>,
    rng: StdRng,
}

impl GnnTrainer {
    pub fn new(
        config: TrainingConfig,
        graph_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            store: GraphStore::new(graph_dir),
            output_dir: output_dir.into(),
            metadata: None,
            graphs: Vec::new(),
            models: BTreeMap::new(),
            results: BTreeMap::new(),
            rng,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn metadata(&self) -> Option<&GraphMetadata> {
        self.metadata.as_ref()
    }

    /// Add or replace a graph, keyed by its name
    pub fn add_graph(&mut self, graph: GraphData) {
        match self.graphs.iter_mut().find(|g| g.name == graph.name) {
            Some(existing) => *existing = graph,
            None => self.graphs.push(graph),
        }
    }

    pub fn graph_names(&self) -> Vec<&str> {
        self.graphs.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn results(&self) -> &BTreeMap<String, TrainingResult> {
        &self.results
    }

    pub fn model(&self, key: &str) -> Option<&GnnModel> {
        self.models.get(key).map(|m| &m.model)
    }

    pub fn model_state(&self, key: &str) -> Option<RunState> {
        self.models.get(key).map(|m| m.state)
    }

    /// Load metadata and every stored graph; returns the number of graphs
    pub fn load_graphs(&mut self) -> Result<usize> {
        let dir = self.store.dir().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::Training(format!(
                "graph directory {} does not exist",
                dir.display()
            )));
        }

        self.metadata = self.store.load_metadata();
        if let Some(metadata) = &self.metadata {
            info!("Metadata lists {} graphs", metadata.graphs_created.len());
        }

        let stored = self.store.load_graphs()?;
        if stored.is_empty() {
            warn!("No graph files in {}", dir.display());
        }
        for (name, graph) in stored {
            let graph = graph.training_graph(&name);
            info!(
                "Graph '{}': {} nodes, {} features, {} edges",
                name,
                graph.num_nodes(),
                graph.num_features(),
                graph.num_edges()
            );
            self.add_graph(graph);
        }
        Ok(self.graphs.len())
    }

    /// Index of `name`, falling back to the first graph with a notice
    fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.graphs.iter().position(|g| g.name == name) {
            return Some(idx);
        }
        match self.graphs.first() {
            Some(first) => {
                warn!(
                    "Graph '{}' not found (available: {:?}), using '{}' instead",
                    name,
                    self.graph_names(),
                    first.name
                );
                Some(0)
            }
            None => {
                warn!("Graph '{}' not found and no graphs are loaded", name);
                None
            }
        }
    }

    /// Labels and 60/20/20 masks for a graph
    pub fn prepare_node_classification(&mut self, graph_name: &str) -> Option<PreparedGraph> {
        let idx = self.resolve(graph_name)?;
        let graph = &self.graphs[idx];
        let labels = NodeLabels::for_graph(&graph.x, graph.labels.as_deref(), &mut self.rng);
        let split = NodeSplit::random(
            graph.num_nodes(),
            self.config.train_ratio,
            self.config.val_ratio,
            &mut self.rng,
        );
        let (train, val, test) = split.counts();
        info!(
            "Prepared '{}': {} classes, train {} / val {} / test {}",
            graph.name,
            labels.num_classes(),
            train,
            val,
            test
        );
        Some(PreparedGraph {
            graph_name: graph.name.clone(),
            labels,
            split,
        })
    }

    /// Train one architecture on one graph
    ///
    /// `Ok(None)` when the architecture is unknown or no graph is available.
    pub fn train_node_classification(
        &mut self,
        graph_name: &str,
        model_type: &str,
    ) -> Result<Option<NodeClassificationResult>> {
        let architecture = match model_type.parse::<Architecture>() {
            Ok(architecture) => architecture,
            Err(e) => {
                warn!("{}, skipping", e);
                return Ok(None);
            }
        };
        let prepared = match self.prepare_node_classification(graph_name) {
            Some(prepared) => prepared,
            None => return Ok(None),
        };
        info!("Training {} on '{}'", architecture, prepared.graph_name);

        let idx = self.resolve(&prepared.graph_name).ok_or_else(|| {
            Error::Training(format!("graph '{}' disappeared", prepared.graph_name))
        })?;
        let (model, result) = fit_node_classifier(
            &self.graphs[idx],
            &prepared,
            architecture,
            &self.config,
            &mut self.rng,
        )?;

        info!(
            "{} on '{}': test accuracy {:.4}, test F1 {:.4}",
            architecture, result.graph_name, result.test_accuracy, result.test_f1
        );
        let key = model_key(architecture.name(), &result.graph_name);
        self.models.insert(key.clone(), model);
        self.results
            .insert(key, TrainingResult::NodeClassification(result.clone()));
        Ok(Some(result))
    }

    /// Train GraphSAGE embeddings scored by dot product
    ///
    /// `Ok(None)` when no graph is available or the graph has no edges.
    pub fn train_link_prediction(&mut self, graph_name: &str) -> Result<Option<LinkPredictionResult>> {
        let idx = match self.resolve(graph_name) {
            Some(idx) => idx,
            None => return Ok(None),
        };
        let graph = &self.graphs[idx];
        if graph.num_edges() == 0 {
            warn!("Graph '{}' has no edges, skipping link prediction", graph.name);
            return Ok(None);
        }
        info!("Link prediction on '{}'", graph.name);

        let result = fit_link_predictor(graph, &self.config, &mut self.rng)?;
        info!("Link prediction on '{}': test AUC {:.4}", result.graph_name, result.test_auc);
        self.results.insert(
            link_key(&result.graph_name),
            TrainingResult::LinkPrediction(result.clone()),
        );
        Ok(Some(result))
    }

    /// Every configured architecture on every graph, then link prediction
    /// per graph; failures are logged and the run continues
    pub fn run_full_training(&mut self) -> Result<TrainingSummary> {
        if self.graphs.is_empty() {
            self.load_graphs()?;
        }
        if self.graphs.is_empty() {
            return Err(Error::Training("no graphs to train on".to_string()));
        }

        let names: Vec<String> = self.graphs.iter().map(|g| g.name.clone()).collect();
        let architectures = self.config.architectures.clone();

        info!("Node classification");
        for name in &names {
            for model_type in &architectures {
                match self.train_node_classification(name, model_type) {
                    Ok(Some(_)) => {}
                    Ok(None) => warn!("{} on '{}' produced no result", model_type, name),
                    Err(e) => error!("{} on '{}' failed: {}", model_type, name, e),
                }
            }
        }

        info!("Link prediction");
        for name in &names {
            match self.train_link_prediction(name) {
                Ok(Some(_)) => {}
                Ok(None) => warn!("Link prediction on '{}' produced no result", name),
                Err(e) => error!("Link prediction on '{}' failed: {}", name, e),
            }
        }

        self.save_results()?;
        Ok(self.summary())
    }

    /// Write every node classification model and `training_results.json`
    pub fn save_results(&mut self) -> Result<PathBuf> {
        let models_dir = self.output_dir.join(MODELS_DIR);
        fs::create_dir_all(&models_dir)?;

        for (key, trained) in self.models.iter_mut() {
            let path = models_dir.join(format!("{}.json", key));
            let writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer(writer, &trained.model)?;
            trained.state = trained.state.advance();
            info!("Saved model {}", path.display());
        }

        let path = self.output_dir.join(RESULTS_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.results)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    pub fn summary(&self) -> TrainingSummary {
        let mut graphs: Vec<String> = Vec::new();
        let mut accuracies = Vec::new();
        let mut aucs = Vec::new();
        for result in self.results.values() {
            if !graphs.iter().any(|g| g == result.graph_name()) {
                graphs.push(result.graph_name().to_string());
            }
            match result {
                TrainingResult::NodeClassification(r) => accuracies.push(r.test_accuracy),
                TrainingResult::LinkPrediction(r) => aucs.push(r.test_auc),
            }
        }
        let mean = |values: &[f64]| {
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };
        TrainingSummary {
            graphs_analyzed: graphs,
            node_runs: accuracies.len(),
            link_runs: aucs.len(),
            avg_accuracy: mean(&accuracies),
            avg_auc: mean(&aucs),
        }
    }

    pub fn print_summary(&self) {
        self.summary().print_summary();
    }
}

fn fit_node_classifier(
    graph: &GraphData,
    prepared: &PreparedGraph,
    architecture: Architecture,
    config: &TrainingConfig,
    rng: &mut StdRng,
) -> Result<(TrainedModel, NodeClassificationResult)> {
    let PreparedGraph { labels, split, .. } = prepared;
    if split.counts().0 == 0 {
        return Err(Error::Training(format!(
            "graph '{}' has no training nodes",
            graph.name
        )));
    }

    let adj = graph.adjacency();
    let model_config = ModelConfig {
        input_dim: graph.num_features(),
        hidden_dim: config.hidden_dim,
        output_dim: labels.width().max(1),
        num_layers: config.num_layers,
        heads: config.heads,
        dropout: config.dropout,
    };
    let mut state = RunState::Untrained;
    let mut model = GnnModel::new(architecture, &model_config, rng)?;
    let mut optimizer = Adam::new(config.learning_rate).with_weight_decay(config.weight_decay);
    let eval_every = config.eval_every.max(1);

    state = state.advance();
    model.train();
    let mut train_losses = Vec::with_capacity(config.epochs);
    let mut val_accuracies = Vec::new();
    for epoch in 0..config.epochs {
        model.zero_grad();
        let logits = model.forward(&graph.x, &adj, rng)?;
        let (loss, grad) = cross_entropy(&logits, &labels.values, &split.train);
        model.backward(&adj, &grad)?;
        optimizer.step(&mut model.parameters_mut());

        if epoch % eval_every == 0 {
            model.eval();
            let out = model.forward(&graph.x, &adj, rng)?;
            let val_acc = Metrics::masked_accuracy(&out, &labels.values, &split.val);
            val_accuracies.push(val_acc);
            info!("  Epoch {:3}: loss={:.4}, val acc={:.4}", epoch, loss, val_acc);
            model.train();
        }
        train_losses.push(loss);
    }

    model.eval();
    let out = model.forward(&graph.x, &adj, rng)?;
    let (predictions, targets) = Metrics::masked_predictions(&out, &labels.values, &split.test);
    state = state.advance();

    let result = NodeClassificationResult {
        model_type: architecture.name().to_string(),
        graph_name: graph.name.clone(),
        test_accuracy: Metrics::accuracy(&predictions, &targets),
        test_f1: Metrics::weighted_f1(&predictions, &targets),
        num_classes: labels.num_classes(),
        label_source: labels.source,
        train_losses,
        val_accuracies,
    };
    Ok((TrainedModel { model, state }, result))
}

fn fit_link_predictor(
    graph: &GraphData,
    config: &TrainingConfig,
    rng: &mut StdRng,
) -> Result<LinkPredictionResult> {
    let n = graph.num_nodes();
    let split = EdgeSplit::random(
        n,
        &graph.edges,
        config.edge_val_ratio,
        config.edge_test_ratio,
        rng,
    );
    if split.train.is_empty() {
        return Err(Error::Training(format!(
            "graph '{}' has no training edges after the split",
            graph.name
        )));
    }
    debug!(
        "Edge split: train {}, val {}, test {}",
        split.train.len(),
        split.val.len(),
        split.test.len()
    );

    // message passing only sees training edges
    let adj = Adjacency::from_edges(n, &split.train);
    let model_config = ModelConfig {
        input_dim: graph.num_features(),
        hidden_dim: config.hidden_dim,
        output_dim: config.embedding_dim,
        num_layers: config.num_layers,
        heads: config.heads,
        dropout: config.dropout,
    };
    let mut model = GnnModel::new(Architecture::GraphSage, &model_config, rng)?;
    let mut optimizer = Adam::new(config.learning_rate);
    let eval_every = config.eval_every.max(1);

    model.train();
    let positives = split.train.len();
    let targets: Array1<f64> = (0..2 * positives)
        .map(|i| if i < positives { 1.0 } else { 0.0 })
        .collect();
    for epoch in 0..config.link_epochs {
        model.zero_grad();
        let z = model.forward(&graph.x, &adj, rng)?;

        let mut pairs = split.train.clone();
        pairs.extend(random_pairs(n, positives, rng));
        let scores = dot_scores(&z, &pairs);
        let (loss, grad_scores) = bce_with_logits(&scores, &targets);
        let grad_z = dot_scores_backward(&z, &pairs, &grad_scores);
        model.backward(&adj, &grad_z)?;
        optimizer.step(&mut model.parameters_mut());

        if epoch % eval_every == 0 {
            info!("  Epoch {:3}: loss={:.4}", epoch, loss);
        }
    }

    model.eval();
    let z = model.forward(&graph.x, &adj, rng)?;
    let mut test_pairs = split.test.clone();
    test_pairs.extend(split.test_neg.iter().copied());
    let labels: Vec<bool> = (0..test_pairs.len()).map(|i| i < split.test.len()).collect();
    let scores = dot_scores(&z, &test_pairs);
    let test_auc = Metrics::roc_auc(&scores.to_vec(), &labels).ok_or_else(|| {
        Error::Training(format!(
            "graph '{}' lacks positive or negative test edges for AUC",
            graph.name
        ))
    })?;

    Ok(LinkPredictionResult {
        model_type: LINK_PREDICTION_MODEL.to_string(),
        graph_name: graph.name.clone(),
        test_auc,
        train_edges: split.train.len(),
        test_edges: split.test.len(),
        embeddings: z,
    })
}

/// Dot product of the embeddings at each pair's endpoints
fn dot_scores(z: &Array2<f64>, pairs: &[(usize, usize)]) -> Array1<f64> {
    pairs
        .iter()
        .map(|&(a, b)| z.row(a).dot(&z.row(b)))
        .collect()
}

fn dot_scores_backward(
    z: &Array2<f64>,
    pairs: &[(usize, usize)],
    grad_scores: &Array1<f64>,
) -> Array2<f64> {
    let mut grad = Array2::zeros(z.raw_dim());
    for (&(a, b), &g) in pairs.iter().zip(grad_scores) {
        grad.row_mut(a).scaled_add(g, &z.row(b));
        grad.row_mut(b).scaled_add(g, &z.row(a));
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 30,
            link_epochs: 20,
            hidden_dim: 8,
            embedding_dim: 4,
            eval_every: 10,
            ..TrainingConfig::default()
        }
    }

    fn ring_graph(name: &str, n: usize, width: usize) -> GraphData {
        let x = Array2::from_shape_fn((n, width), |(i, j)| ((i * width + j) as f64 * 0.31).sin());
        let mut graph = GraphData::new(name, x);
        for i in 0..n {
            graph.add_edge(i, (i + 1) % n, 1.0);
            graph.add_edge(i, (i + 3) % n, 1.0);
        }
        graph
    }

    #[test]
    fn test_dot_scores_and_backward() {
        let z = array![[1.0, 2.0], [3.0, 4.0]];
        let pairs = [(0, 1), (1, 1)];
        assert_eq!(dot_scores(&z, &pairs).to_vec(), vec![11.0, 25.0]);

        let grad = dot_scores_backward(&z, &pairs, &array![1.0, 0.5]);
        assert_eq!(grad.row(0).to_vec(), vec![3.0, 4.0]);
        // d/dz1 of z0.z1 plus 0.5 * d/dz1 of z1.z1
        assert_eq!(grad.row(1).to_vec(), vec![1.0 + 3.0, 2.0 + 4.0]);
    }

    #[test]
    fn test_node_classification_records_curves() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        trainer.add_graph(ring_graph("event_similarity", 30, 5));

        let result = trainer
            .train_node_classification("event_similarity", "GCN")
            .unwrap()
            .unwrap();
        assert_eq!(result.train_losses.len(), 30);
        assert_eq!(result.val_accuracies.len(), 3);
        assert!(result.num_classes <= 3);
        assert!((0.0..=1.0).contains(&result.test_accuracy));
        assert_eq!(
            trainer.model_state("GCN_event_similarity"),
            Some(RunState::Evaluated)
        );
    }

    #[test]
    fn test_unknown_architecture_yields_none() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        trainer.add_graph(ring_graph("event_similarity", 10, 5));
        let result = trainer
            .train_node_classification("event_similarity", "Transformer")
            .unwrap();
        assert!(result.is_none());
        assert!(trainer.results().is_empty());
    }

    #[test]
    fn test_unknown_graph_falls_back_to_first() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        trainer.add_graph(ring_graph("heterogeneous", 20, 5));
        let result = trainer
            .train_node_classification("missing", "GraphSAGE")
            .unwrap()
            .unwrap();
        assert_eq!(result.graph_name, "heterogeneous");
        assert!(trainer.results().contains_key("GraphSAGE_heterogeneous"));
    }

    #[test]
    fn test_link_prediction_on_edgeless_graph() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        trainer.add_graph(GraphData::new("event_similarity", Array2::ones((6, 3))));
        assert!(trainer.train_link_prediction("event_similarity").unwrap().is_none());
        assert!(trainer.results().is_empty());
    }

    #[test]
    fn test_link_prediction_returns_embeddings() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        trainer.add_graph(ring_graph("event_similarity", 30, 6));
        let result = trainer
            .train_link_prediction("event_similarity")
            .unwrap()
            .unwrap();
        assert_eq!(result.embeddings.dim(), (30, 4));
        assert!((0.0..=1.0).contains(&result.test_auc));
        assert_eq!(result.model_type, LINK_PREDICTION_MODEL);
        assert!(trainer.results().contains_key("LinkPred_event_similarity"));
    }

    #[test]
    fn test_save_results_persists_models() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path().join("out"));
        trainer.add_graph(ring_graph("event_similarity", 20, 5));
        trainer
            .train_node_classification("event_similarity", "GAT")
            .unwrap();
        trainer.train_link_prediction("event_similarity").unwrap();

        let path = trainer.save_results().unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(json["GAT_event_similarity"]["test_accuracy"].is_number());
        assert!(json["LinkPred_event_similarity"].get("embeddings").is_none());

        let model_path = dir.path().join("out/models/GAT_event_similarity.json");
        assert!(model_path.exists());
        assert!(!dir.path().join("out/models/LinkPred_event_similarity.json").exists());
        assert_eq!(
            trainer.model_state("GAT_event_similarity"),
            Some(RunState::Persisted)
        );
    }

    #[test]
    fn test_run_without_graphs_fails() {
        let dir = tempdir().unwrap();
        let mut trainer = GnnTrainer::new(small_config(), dir.path(), dir.path());
        assert!(trainer.run_full_training().is_err());
    }
}
