//! Graph convolution with symmetric normalization
//!
//! `H' = D^-1/2 (A + I) D^-1/2 H W + b`, where `D` counts the self-loop.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layers::{bias_grad, Parameter};
use crate::error::{Error, Result};
use crate::graph::Adjacency;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnConv {
    pub weight: Parameter,
    pub bias: Parameter,
    #[serde(skip)]
    last_input: Option<Array2<f64>>,
}

impl GcnConv {
    pub fn new<R: Rng>(input_dim: usize, output_dim: usize, rng: &mut R) -> Self {
        Self {
            weight: Parameter::xavier(input_dim, output_dim, rng),
            bias: Parameter::zeros(1, output_dim),
            last_input: None,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn forward(&mut self, x: &Array2<f64>, adj: &Adjacency) -> Array2<f64> {
        let projected = x.dot(&self.weight.value);
        self.last_input = Some(x.clone());
        normalized_propagate(adj, &projected) + &self.bias.value
    }

    /// Accumulate parameter gradients and return the gradient w.r.t. the input
    pub fn backward(&mut self, adj: &Adjacency, grad: &Array2<f64>) -> Result<Array2<f64>> {
        let input = self
            .last_input
            .take()
            .ok_or_else(|| Error::Training("GCN backward before forward".to_string()))?;

        self.bias.accumulate(&bias_grad(grad));
        // the normalized operator is symmetric, so its transpose is itself
        let grad_projected = normalized_propagate(adj, grad);
        self.weight.accumulate(&input.t().dot(&grad_projected));
        Ok(grad_projected.dot(&self.weight.value.t()))
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }
}

/// Multiply `m` by the self-looped, symmetrically normalized adjacency
pub fn normalized_propagate(adj: &Adjacency, m: &Array2<f64>) -> Array2<f64> {
    let inv_sqrt: Vec<f64> = (0..adj.num_nodes())
        .map(|i| 1.0 / ((adj.degree(i) + 1) as f64).sqrt())
        .collect();

    let mut out = Array2::zeros(m.raw_dim());
    for i in 0..adj.num_nodes() {
        let mut row = out.row_mut(i);
        row.scaled_add(inv_sqrt[i] * inv_sqrt[i], &m.row(i));
        for &j in adj.neighbors(i) {
            row.scaled_add(inv_sqrt[i] * inv_sqrt[j], &m.row(j));
        }
    }
    out
}
