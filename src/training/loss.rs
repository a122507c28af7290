//! Loss functions returning the loss value and its gradient

use ndarray::{Array1, Array2};

/// Mean softmax cross-entropy over the rows selected by `mask`
///
/// Returns the loss and the gradient w.r.t. `logits`; unselected rows get a
/// zero gradient.
pub fn cross_entropy(logits: &Array2<f64>, labels: &[usize], mask: &[bool]) -> (f64, Array2<f64>) {
    let mut grad = Array2::zeros(logits.raw_dim());
    let count = mask.iter().filter(|&&m| m).count();
    if count == 0 {
        return (0.0, grad);
    }
    let scale = 1.0 / count as f64;

    let mut loss = 0.0;
    for (i, row) in logits.rows().into_iter().enumerate() {
        if !mask[i] {
            continue;
        }
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let exp = row.mapv(|v| (v - max).exp());
        let total = exp.sum();
        loss -= (exp[labels[i]] / total).ln();

        let mut g = grad.row_mut(i);
        g.assign(&(exp / total * scale));
        g[labels[i]] -= scale;
    }
    (loss * scale, grad)
}

/// Mean binary cross-entropy on raw scores (numerically stable form)
pub fn bce_with_logits(scores: &Array1<f64>, targets: &Array1<f64>) -> (f64, Array1<f64>) {
    let n = scores.len();
    if n == 0 {
        return (0.0, Array1::zeros(0));
    }
    let scale = 1.0 / n as f64;
    let loss = scores
        .iter()
        .zip(targets)
        .map(|(&s, &y)| s.max(0.0) - s * y + (-s.abs()).exp().ln_1p())
        .sum::<f64>()
        * scale;
    let grad = ndarray::Zip::from(scores)
        .and(targets)
        .map_collect(|&s, &y| (sigmoid(s) - y) * scale);
    (loss, grad)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let logits = Array2::zeros((3, 4));
        let (loss, grad) = cross_entropy(&logits, &[0, 1, 2], &[true, true, false]);
        assert_relative_eq!(loss, 4f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(grad[[0, 0]], (0.25 - 1.0) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(grad[[0, 3]], 0.25 / 2.0, epsilon = 1e-12);
        assert_eq!(grad.row(2).sum(), 0.0);
    }

    #[test]
    fn test_cross_entropy_gradient_matches_finite_difference() {
        let mut logits = array![[0.3, -1.2, 0.8], [1.5, 0.1, -0.4]];
        let labels = [2, 0];
        let mask = [true, true];
        let (_, grad) = cross_entropy(&logits, &labels, &mask);
        let eps = 1e-6;
        logits[[1, 1]] += eps;
        let (plus, _) = cross_entropy(&logits, &labels, &mask);
        logits[[1, 1]] -= 2.0 * eps;
        let (minus, _) = cross_entropy(&logits, &labels, &mask);
        assert_relative_eq!(grad[[1, 1]], (plus - minus) / (2.0 * eps), epsilon = 1e-6);
    }

    #[test]
    fn test_empty_mask() {
        let (loss, grad) = cross_entropy(&Array2::ones((2, 2)), &[0, 1], &[false, false]);
        assert_eq!(loss, 0.0);
        assert_eq!(grad.sum(), 0.0);
    }

    #[test]
    fn test_bce_with_logits() {
        let (loss, grad) = bce_with_logits(&array![0.0, 0.0], &array![1.0, 0.0]);
        assert_relative_eq!(loss, 2f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(grad[0], -0.25, epsilon = 1e-12);
        assert_relative_eq!(grad[1], 0.25, epsilon = 1e-12);

        // large logits stay finite
        let (loss, _) = bce_with_logits(&array![500.0, -500.0], &array![0.0, 1.0]);
        assert_relative_eq!(loss, 500.0, epsilon = 1e-9);
    }
}
