//! Adam optimizer with L2 weight decay

use crate::gnn::Parameter;

#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    /// Added to the gradient as `weight_decay * value`
    weight_decay: f64,
    step: i32,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
            step: 0,
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Apply one update to every parameter using its accumulated gradient
    pub fn step(&mut self, params: &mut [&mut Parameter]) {
        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step);
        let bias2 = 1.0 - self.beta2.powi(self.step);

        for param in params.iter_mut() {
            param.ensure_state();
            let grad = if self.weight_decay > 0.0 {
                &param.grad + &(&param.value * self.weight_decay)
            } else {
                param.grad.clone()
            };

            param.first_moment = &param.first_moment * self.beta1 + &grad * (1.0 - self.beta1);
            param.second_moment =
                &param.second_moment * self.beta2 + &grad.mapv(|g| g * g) * (1.0 - self.beta2);

            let lr = self.learning_rate;
            let eps = self.epsilon;
            let Parameter {
                value,
                first_moment,
                second_moment,
                ..
            } = &mut **param;
            ndarray::Zip::from(value)
                .and(&*first_moment)
                .and(&*second_moment)
                .for_each(|w, &m, &v| {
                    *w -= lr * (m / bias1) / ((v / bias2).sqrt() + eps);
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut p = Parameter::new(array![[1.0, -1.0]]);
        p.accumulate(&array![[0.5, -2.0]]);
        let mut adam = Adam::new(0.01);
        adam.step(&mut [&mut p]);
        // bias-corrected first step is lr * sign(grad)
        assert_relative_eq!(p.value[[0, 0]], 0.99, epsilon = 1e-6);
        assert_relative_eq!(p.value[[0, 1]], -0.99, epsilon = 1e-6);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        // f(w) = (w - 3)^2
        let mut p = Parameter::new(array![[0.0]]);
        let mut adam = Adam::new(0.1);
        for _ in 0..500 {
            p.zero_grad();
            let g = 2.0 * (p.value[[0, 0]] - 3.0);
            p.accumulate(&array![[g]]);
            adam.step(&mut [&mut p]);
        }
        assert_relative_eq!(p.value[[0, 0]], 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_weight_decay_shrinks_without_gradient() {
        let mut p = Parameter::new(array![[2.0]]);
        let mut adam = Adam::new(0.01).with_weight_decay(0.1);
        adam.step(&mut [&mut p]);
        assert!(p.value[[0, 0]] < 2.0);
    }
}
