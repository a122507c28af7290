//! Multi-head graph attention
//!
//! Per head `k`, node `i` attends over its neighbors plus itself:
//!
//! ```text
//! e_ij = LeakyReLU(a_src · W h_j + a_dst · W h_i)
//! alpha_ij = softmax_j(e_ij)
//! h'_i = sum_j alpha_ij W h_j
//! ```
//!
//! Hidden layers concatenate the heads; an averaging layer divides their sum
//! by the head count.

use ndarray::{s, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layers::{bias_grad, leaky_relu, Parameter, ATTENTION_SLOPE};
use crate::error::{Error, Result};
use crate::graph::Adjacency;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatConv {
    pub heads: usize,
    /// Output width of each head
    pub head_dim: usize,
    /// Concatenate heads, otherwise average them
    pub concat: bool,
    /// `input_dim x heads * head_dim`
    pub weight: Parameter,
    /// `heads x head_dim`
    pub att_src: Parameter,
    pub att_dst: Parameter,
    pub bias: Parameter,
    #[serde(skip)]
    cache: Option<GatCache>,
}

#[derive(Debug, Clone)]
struct GatCache {
    input: Array2<f64>,
    projected: Array2<f64>,
    /// Per node, `receptive field x heads` attention weights, row-major
    alpha: Vec<Vec<f64>>,
    /// Attention logits before LeakyReLU, same layout as `alpha`
    logits: Vec<Vec<f64>>,
}

/// Neighbors of `i` followed by `i` itself
fn receptive_field(adj: &Adjacency, i: usize) -> impl Iterator<Item = usize> + '_ {
    adj.neighbors(i).iter().copied().chain(std::iter::once(i))
}

impl GatConv {
    pub fn new<R: Rng>(
        input_dim: usize,
        head_dim: usize,
        heads: usize,
        concat: bool,
        rng: &mut R,
    ) -> Self {
        let width = if concat { heads * head_dim } else { head_dim };
        Self {
            heads,
            head_dim,
            concat,
            weight: Parameter::xavier(input_dim, heads * head_dim, rng),
            att_src: Parameter::xavier(heads, head_dim, rng),
            att_dst: Parameter::xavier(heads, head_dim, rng),
            bias: Parameter::zeros(1, width),
            cache: None,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.bias.value.ncols()
    }

    /// Column offset and scale of head `k` in the output
    fn head_slot(&self, k: usize) -> (usize, f64) {
        if self.concat {
            (k * self.head_dim, 1.0)
        } else {
            (0, 1.0 / self.heads as f64)
        }
    }

    pub fn forward(&mut self, x: &Array2<f64>, adj: &Adjacency) -> Array2<f64> {
        let n = x.nrows();
        let (heads, f) = (self.heads, self.head_dim);
        let projected = x.dot(&self.weight.value);

        let mut src = Array2::<f64>::zeros((n, heads));
        let mut dst = Array2::<f64>::zeros((n, heads));
        for node in 0..n {
            for k in 0..heads {
                let feat = projected.slice(s![node, k * f..(k + 1) * f]);
                src[[node, k]] = feat.dot(&self.att_src.value.row(k));
                dst[[node, k]] = feat.dot(&self.att_dst.value.row(k));
            }
        }

        let mut out = Array2::zeros((n, self.output_dim()));
        let mut alpha = Vec::with_capacity(n);
        let mut logits = Vec::with_capacity(n);
        for i in 0..n {
            let field: Vec<usize> = receptive_field(adj, i).collect();
            let mut weights = vec![0.0; field.len() * heads];
            let mut raw = vec![0.0; field.len() * heads];

            for k in 0..heads {
                let mut max = f64::NEG_INFINITY;
                for (p, &j) in field.iter().enumerate() {
                    let u = src[[j, k]] + dst[[i, k]];
                    raw[p * heads + k] = u;
                    let e = leaky_relu(u, ATTENTION_SLOPE);
                    weights[p * heads + k] = e;
                    max = max.max(e);
                }
                let mut total = 0.0;
                for p in 0..field.len() {
                    let w = (weights[p * heads + k] - max).exp();
                    weights[p * heads + k] = w;
                    total += w;
                }

                let (offset, scale) = self.head_slot(k);
                for (p, &j) in field.iter().enumerate() {
                    weights[p * heads + k] /= total;
                    let message = projected.slice(s![j, k * f..(k + 1) * f]);
                    out.slice_mut(s![i, offset..offset + f])
                        .scaled_add(scale * weights[p * heads + k], &message);
                }
            }
            alpha.push(weights);
            logits.push(raw);
        }

        out += &self.bias.value;
        self.cache = Some(GatCache {
            input: x.clone(),
            projected,
            alpha,
            logits,
        });
        out
    }

    pub fn backward(&mut self, adj: &Adjacency, grad: &Array2<f64>) -> Result<Array2<f64>> {
        let GatCache {
            input,
            projected,
            alpha,
            logits,
        } = self
            .cache
            .take()
            .ok_or_else(|| Error::Training("GAT backward before forward".to_string()))?;

        let n = input.nrows();
        let (heads, f) = (self.heads, self.head_dim);
        self.bias.accumulate(&bias_grad(grad));

        let mut grad_projected = Array2::<f64>::zeros(projected.raw_dim());
        let mut grad_src = Array2::<f64>::zeros((n, heads));
        let mut grad_dst = Array2::<f64>::zeros((n, heads));

        for i in 0..n {
            let field: Vec<usize> = receptive_field(adj, i).collect();
            for k in 0..heads {
                let (offset, scale) = self.head_slot(k);
                let upstream = grad.slice(s![i, offset..offset + f]);

                let mut grad_alpha = vec![0.0; field.len()];
                let mut expected = 0.0;
                for (p, &j) in field.iter().enumerate() {
                    let a = alpha[i][p * heads + k];
                    let message = projected.slice(s![j, k * f..(k + 1) * f]);
                    grad_alpha[p] = scale * upstream.dot(&message);
                    expected += a * grad_alpha[p];
                    grad_projected
                        .slice_mut(s![j, k * f..(k + 1) * f])
                        .scaled_add(scale * a, &upstream);
                }

                // softmax then LeakyReLU
                for (p, &j) in field.iter().enumerate() {
                    let a = alpha[i][p * heads + k];
                    let slope = if logits[i][p * heads + k] > 0.0 {
                        1.0
                    } else {
                        ATTENTION_SLOPE
                    };
                    let grad_logit = a * (grad_alpha[p] - expected) * slope;
                    grad_src[[j, k]] += grad_logit;
                    grad_dst[[i, k]] += grad_logit;
                }
            }
        }

        let mut grad_att_src = Array2::<f64>::zeros((heads, f));
        let mut grad_att_dst = Array2::<f64>::zeros((heads, f));
        for node in 0..n {
            for k in 0..heads {
                let feat = projected.slice(s![node, k * f..(k + 1) * f]);
                grad_att_src.row_mut(k).scaled_add(grad_src[[node, k]], &feat);
                grad_att_dst.row_mut(k).scaled_add(grad_dst[[node, k]], &feat);

                let mut slot = grad_projected.slice_mut(s![node, k * f..(k + 1) * f]);
                slot.scaled_add(grad_src[[node, k]], &self.att_src.value.row(k));
                slot.scaled_add(grad_dst[[node, k]], &self.att_dst.value.row(k));
            }
        }

        self.att_src.accumulate(&grad_att_src);
        self.att_dst.accumulate(&grad_att_dst);
        self.weight.accumulate(&input.t().dot(&grad_projected));
        Ok(grad_projected.dot(&self.weight.value.t()))
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![
            &mut self.weight,
            &mut self.att_src,
            &mut self.att_dst,
            &mut self.bias,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(concat: bool) -> (GatConv, Adjacency, Array2<f64>) {
        let mut rng = StdRng::seed_from_u64(11);
        let adj = Adjacency::from_edges(5, &[(0, 1), (1, 2), (1, 3), (3, 4)]);
        let x = Array2::from_shape_fn((5, 4), |(i, j)| ((i * 4 + j) as f64 * 0.53).cos());
        let conv = GatConv::new(4, 3, 2, concat, &mut rng);
        (conv, adj, x)
    }

    /// Weighted sum keeps the test sensitive to every output column
    fn loss(out: &Array2<f64>) -> f64 {
        out.indexed_iter()
            .map(|((i, j), v)| v * (1.0 + 0.1 * (i + 2 * j) as f64))
            .sum()
    }

    fn loss_grad(dim: (usize, usize)) -> Array2<f64> {
        Array2::from_shape_fn(dim, |(i, j)| 1.0 + 0.1 * (i + 2 * j) as f64)
    }

    #[test]
    fn test_output_width() {
        let (mut concat, adj, x) = setup(true);
        assert_eq!(concat.forward(&x, &adj).dim(), (5, 6));
        let (mut mean, adj, x) = setup(false);
        assert_eq!(mean.forward(&x, &adj).dim(), (5, 3));
    }

    #[test]
    fn test_attention_is_a_distribution() {
        let (mut conv, adj, x) = setup(true);
        conv.forward(&x, &adj);
        let cache = conv.cache.as_ref().unwrap();
        for (i, weights) in cache.alpha.iter().enumerate() {
            assert_eq!(weights.len(), (adj.degree(i) + 1) * 2);
            for k in 0..2 {
                let total: f64 = weights.iter().skip(k).step_by(2).sum();
                assert_relative_eq!(total, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_gradients_match_finite_difference() {
        for concat in [true, false] {
            let (mut conv, adj, mut x) = setup(concat);
            let out = conv.forward(&x, &adj);
            let grad_input = conv.backward(&adj, &loss_grad(out.dim())).unwrap();
            let eps = 1e-6;

            let analytic = conv.att_src.grad[[1, 2]];
            conv.att_src.value[[1, 2]] += eps;
            let plus = loss(&conv.forward(&x, &adj));
            conv.att_src.value[[1, 2]] -= 2.0 * eps;
            let minus = loss(&conv.forward(&x, &adj));
            conv.att_src.value[[1, 2]] += eps;
            assert_relative_eq!(analytic, (plus - minus) / (2.0 * eps), epsilon = 1e-5);

            let analytic = conv.weight.grad[[0, 4]];
            conv.weight.value[[0, 4]] += eps;
            let plus = loss(&conv.forward(&x, &adj));
            conv.weight.value[[0, 4]] -= 2.0 * eps;
            let minus = loss(&conv.forward(&x, &adj));
            conv.weight.value[[0, 4]] += eps;
            assert_relative_eq!(analytic, (plus - minus) / (2.0 * eps), epsilon = 1e-5);

            x[[1, 3]] += eps;
            let plus = loss(&conv.forward(&x, &adj));
            x[[1, 3]] -= 2.0 * eps;
            let minus = loss(&conv.forward(&x, &adj));
            assert_relative_eq!(grad_input[[1, 3]], (plus - minus) / (2.0 * eps), epsilon = 1e-5);
        }
    }
}
