//! GraphSAGE convolution with mean aggregation
//!
//! `h'_i = W_l · mean_{j ∈ N(i)} h_j + b + W_r · h_i`; isolated nodes
//! aggregate to zero.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layers::{bias_grad, Parameter};
use crate::error::{Error, Result};
use crate::graph::Adjacency;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SageConv {
    /// Applied to the aggregated neighborhood
    pub weight_neighbors: Parameter,
    /// Applied to the node's own features
    pub weight_root: Parameter,
    pub bias: Parameter,
    #[serde(skip)]
    cache: Option<SageCache>,
}

#[derive(Debug, Clone)]
struct SageCache {
    input: Array2<f64>,
    aggregated: Array2<f64>,
}

impl SageConv {
    pub fn new<R: Rng>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        Self {
            weight_neighbors: Parameter::xavier(input_dim, output_dim, rng),
            weight_root: Parameter::xavier(input_dim, output_dim, rng),
            bias: Parameter::zeros(1, output_dim),
            cache: None,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.weight_root.value.ncols()
    }

    pub fn forward(&mut self, x: &Array2<f64>, adj: &Adjacency) -> Array2<f64> {
        let aggregated = mean_aggregate(adj, x);
        let out = aggregated.dot(&self.weight_neighbors.value)
            + &self.bias.value
            + x.dot(&self.weight_root.value);
        self.cache = Some(SageCache {
            input: x.clone(),
            aggregated,
        });
        out
    }

    pub fn backward(&mut self, adj: &Adjacency, grad: &Array2<f64>) -> Result<Array2<f64>> {
        let SageCache { input, aggregated } = self
            .cache
            .take()
            .ok_or_else(|| Error::Training("SAGE backward before forward".to_string()))?;

        self.bias.accumulate(&bias_grad(grad));
        self.weight_neighbors.accumulate(&aggregated.t().dot(grad));
        self.weight_root.accumulate(&input.t().dot(grad));

        let grad_aggregated = grad.dot(&self.weight_neighbors.value.t());
        let mut grad_input = grad.dot(&self.weight_root.value.t());
        for i in 0..adj.num_nodes() {
            let degree = adj.degree(i);
            if degree == 0 {
                continue;
            }
            let share = 1.0 / degree as f64;
            for &j in adj.neighbors(i) {
                grad_input.row_mut(j).scaled_add(share, &grad_aggregated.row(i));
            }
        }
        Ok(grad_input)
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.weight_neighbors,
            &mut self.weight_root,
            &mut self.bias,
        ]
    }
}

/// Mean of neighbor rows; zero for isolated nodes
pub fn mean_aggregate(adj: &Adjacency, x: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(x.raw_dim());
    for i in 0..adj.num_nodes() {
        let neighbors = adj.neighbors(i);
        if neighbors.is_empty() {
            continue;
        }
        let share = 1.0 / neighbors.len() as f64;
        let mut row = out.row_mut(i);
        for &j in neighbors {
            row.scaled_add(share, &x.row(j));
        }
    }
    out
}
