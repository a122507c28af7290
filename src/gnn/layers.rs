//! Trainable parameters and activation helpers shared by the conv layers

use ndarray::{Array2, Axis, Ix2};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Slope of the LeakyReLU applied to attention logits
pub const ATTENTION_SLOPE: f64 = 0.2;

/// Weight matrix with its gradient and Adam moments
///
/// Only `value` is persisted; the optimizer state is rebuilt on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub value: Array2<f64>,
    #[serde(skip)]
    pub grad: Array2<f64>,
    #[serde(skip)]
    pub(crate) first_moment: Array2<f64>,
    #[serde(skip)]
    pub(crate) second_moment: Array2<f64>,
}

impl Parameter {
    pub fn new(value: Array2<f64>) -> Self {
        let dim = value.raw_dim();
        Self {
            value,
            grad: Array2::zeros(dim.clone()),
            first_moment: Array2::zeros(dim.clone()),
            second_moment: Array2::zeros(dim),
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(Array2::zeros((rows, cols)))
    }

    /// Xavier (Glorot) normal initialization
    pub fn xavier<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let std = (2.0 / (rows + cols).max(1) as f64).sqrt();
        let value = Array2::from_shape_fn((rows, cols), |_| {
            let z: f64 = rng.sample(StandardNormal);
            z * std
        });
        Self::new(value)
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Reallocate gradient and moments if they were skipped on load
    pub(crate) fn ensure_state(&mut self) {
        let dim = self.value.raw_dim();
        if self.grad.raw_dim() != dim {
            self.grad = Array2::zeros(dim.clone());
        }
        if self.first_moment.raw_dim() != dim {
            self.first_moment = Array2::zeros(dim.clone());
        }
        if self.second_moment.raw_dim() != dim {
            self.second_moment = Array2::zeros(dim);
        }
    }

    pub fn zero_grad(&mut self) {
        self.ensure_state();
        self.grad.fill(0.0);
    }

    pub fn accumulate(&mut self, grad: &Array2<f64>) {
        self.ensure_state();
        self.grad += grad;
    }
}

pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

pub fn leaky_relu(x: f64, slope: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        slope * x
    }
}

/// Zero the gradient wherever the pre-activation was not positive
pub fn relu_backward(grad: &mut Array2<f64>, pre_activation: &Array2<f64>) {
    grad.zip_mut_with(pre_activation, |g, &z| {
        if z <= 0.0 {
            *g = 0.0;
        }
    });
}

/// Inverted dropout mask: kept entries are scaled by `1 / (1 - p)`
pub fn dropout_mask<R: Rng>(dim: Ix2, p: f64, rng: &mut R) -> Array2<f64> {
    let keep = 1.0 - p;
    Array2::from_shape_fn(dim, |_| {
        if rng.gen::<f64>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

/// Column sums as a `1 x cols` row, the gradient of a broadcast bias
pub fn bias_grad(grad: &Array2<f64>) -> Array2<f64> {
    grad.sum_axis(Axis(0)).insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_xavier_shape_and_scale() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = Parameter::xavier(64, 32, &mut rng);
        assert_eq!(p.value.dim(), (64, 32));
        let mean = p.value.mean().unwrap();
        assert!(mean.abs() < 0.05);
        assert_eq!(p.grad.dim(), (64, 32));
    }

    #[test]
    fn test_accumulate_after_deserialize() {
        let p = Parameter::new(array![[1.0, 2.0]]);
        let json = serde_json::to_string(&p).unwrap();
        let mut loaded: Parameter = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.grad.len(), 0);
        loaded.accumulate(&array![[0.5, 0.5]]);
        loaded.accumulate(&array![[0.5, 1.0]]);
        assert_eq!(loaded.grad, array![[1.0, 1.5]]);
        loaded.zero_grad();
        assert_eq!(loaded.grad, array![[0.0, 0.0]]);
    }

    #[test]
    fn test_activations() {
        assert_eq!(relu(-1.0), 0.0);
        assert_eq!(leaky_relu(-1.0, ATTENTION_SLOPE), -0.2);
        assert_eq!(leaky_relu(3.0, ATTENTION_SLOPE), 3.0);

        let mut grad = array![[1.0, 1.0], [1.0, 1.0]];
        relu_backward(&mut grad, &array![[-1.0, 2.0], [0.0, 0.5]]);
        assert_eq!(grad, array![[0.0, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_dropout_mask_values() {
        let mut rng = StdRng::seed_from_u64(1);
        let mask = dropout_mask(Ix2(20, 20), 0.5, &mut rng);
        assert!(mask.iter().all(|&v| v == 0.0 || v == 2.0));
        let kept = mask.iter().filter(|&&v| v > 0.0).count();
        assert!(kept > 100 && kept < 300);
    }

    #[test]
    fn test_bias_grad() {
        let g = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(bias_grad(&g), array![[4.0, 6.0]]);
    }
}
