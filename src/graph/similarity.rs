//! Event similarity graph
//!
//! Cosine similarity over the textual block decides the edges; nodes carry the
//! full concatenated feature vector.

use super::{GraphData, GraphStats, NodeAttributes};
use crate::data::EventTable;
use crate::error::{Error, Result};
use crate::features::FeatureSet;
use crate::utils::GraphConfig;
use ndarray::Array2;
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where similarity values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilaritySource {
    /// Cosine similarity of textual feature rows
    Cosine,
    /// Pseudo-random placeholder used when the textual block is degenerate
    Synthetic,
}

/// Pairwise similarity with its provenance
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    pub values: Array2<f64>,
    pub source: SimilaritySource,
}

impl SimilarityMatrix {
    /// Cosine similarity of `textual`; a width of one or less yields a seeded
    /// random matrix in [0, 1) with unit diagonal instead
    ///
    /// [`FeatureEngineer`](crate::features::FeatureEngineer) never produces a
    /// block that narrow (a one-term vocabulary becomes the dummy block), so
    /// only externally supplied textual blocks take the synthetic path.
    pub fn compute(textual: &Array2<f64>, seed: u64) -> Self {
        if textual.ncols() > 1 {
            return Self {
                values: cosine_similarity_matrix(textual),
                source: SimilaritySource::Cosine,
            };
        }

        warn!("Textual block has width {}, using synthetic similarity", textual.ncols());
        let n = textual.nrows();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = Array2::from_shape_fn((n, n), |_| rng.gen::<f64>());
        for i in 0..n {
            values[[i, i]] = 1.0;
        }
        Self {
            values,
            source: SimilaritySource::Synthetic,
        }
    }
}

/// Row-wise cosine similarity; rows with zero norm are similar to nothing
pub fn cosine_similarity_matrix(x: &Array2<f64>) -> Array2<f64> {
    let norms: Vec<f64> = x
        .rows()
        .into_iter()
        .map(|r| r.dot(&r).sqrt())
        .collect();
    let gram = x.dot(&x.t());
    let n = x.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if norms[i] == 0.0 || norms[j] == 0.0 {
            0.0
        } else {
            gram[[i, j]] / (norms[i] * norms[j])
        }
    })
}

/// Built similarity graph
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    pub graph: GraphData,
    /// Threshold that produced the edges
    pub threshold: f64,
    /// True when the relaxed threshold was used
    pub relaxed: bool,
    pub source: SimilaritySource,
    /// Connected components, isolated nodes included
    pub components: usize,
}

impl SimilarityGraph {
    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }
}

/// Builds [`SimilarityGraph`]s from engineered features
#[derive(Debug, Clone)]
pub struct SimilarityGraphBuilder {
    threshold: f64,
    relaxed_threshold: f64,
    min_edges: usize,
    auto_relax: bool,
    seed: u64,
}

impl SimilarityGraphBuilder {
    pub fn new(config: &GraphConfig, seed: u64) -> Self {
        Self {
            threshold: config.similarity_threshold,
            relaxed_threshold: config.relaxed_threshold,
            min_edges: config.min_edges,
            auto_relax: config.auto_relax,
            seed,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_auto_relax(mut self, auto_relax: bool) -> Self {
        self.auto_relax = auto_relax;
        self
    }

    /// Build with the configured threshold, relaxing it at most once when the
    /// graph is too sparse
    pub fn build(&self, table: &EventTable, features: &FeatureSet) -> Result<SimilarityGraph> {
        let similarity = SimilarityMatrix::compute(&features.textual.matrix, self.seed);
        let first = self.assemble(table, features, &similarity, self.threshold)?;

        let sparse = first.graph.num_edges() < self.min_edges;
        if !(self.auto_relax && sparse && self.threshold > self.relaxed_threshold) {
            return Ok(self.finish(first));
        }

        warn!(
            "Only {} edges at threshold {}, retrying with {}",
            first.graph.num_edges(),
            self.threshold,
            self.relaxed_threshold
        );
        let mut relaxed = self.assemble(table, features, &similarity, self.relaxed_threshold)?;
        relaxed.relaxed = true;
        Ok(self.finish(relaxed))
    }

    /// Build with exactly `threshold`, no relaxation
    pub fn build_with_threshold(
        &self,
        table: &EventTable,
        features: &FeatureSet,
        threshold: f64,
    ) -> Result<SimilarityGraph> {
        let similarity = SimilarityMatrix::compute(&features.textual.matrix, self.seed);
        let graph = self.assemble(table, features, &similarity, threshold)?;
        Ok(self.finish(graph))
    }

    fn finish(&self, graph: SimilarityGraph) -> SimilarityGraph {
        if graph.graph.num_edges() == 0 {
            warn!("Similarity graph has no edges, keeping it edgeless");
        }
        info!(
            "Similarity graph: {} nodes, {} edges (threshold {})",
            graph.graph.num_nodes(),
            graph.graph.num_edges(),
            graph.threshold
        );
        graph
    }

    fn assemble(
        &self,
        table: &EventTable,
        features: &FeatureSet,
        similarity: &SimilarityMatrix,
        threshold: f64,
    ) -> Result<SimilarityGraph> {
        let n = table.len();
        if similarity.values.nrows() != n {
            return Err(Error::ShapeMismatch {
                context: "similarity matrix rows",
                expected: n,
                got: similarity.values.nrows(),
            });
        }

        let mut ungraph: UnGraph<usize, f64> = UnGraph::with_capacity(n, 0);
        let nodes: Vec<_> = (0..n).map(|i| ungraph.add_node(i)).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = similarity.values[[i, j]];
                if sim > threshold {
                    ungraph.add_edge(nodes[i], nodes[j], sim);
                }
            }
        }

        let mut graph = GraphData::new("event_similarity", features.concatenated()?);
        graph.node_attrs = NodeAttributes::from_table(table);
        for edge in ungraph.raw_edges() {
            graph.add_edge(edge.source().index(), edge.target().index(), edge.weight);
        }

        Ok(SimilarityGraph {
            components: connected_components(&ungraph),
            graph,
            threshold,
            relaxed: false,
            source: similarity.source,
        })
    }
}
