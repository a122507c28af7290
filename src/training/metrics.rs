//! Evaluation metrics for node classification and link prediction

use hashbrown::HashMap;
use ndarray::Array2;

/// Metrics calculator
pub struct Metrics;

impl Metrics {
    /// Fraction of matching labels; 0 for empty input
    pub fn accuracy(predictions: &[usize], targets: &[usize]) -> f64 {
        if predictions.len() != targets.len() || predictions.is_empty() {
            return 0.0;
        }
        let correct = predictions
            .iter()
            .zip(targets)
            .filter(|(p, t)| p == t)
            .count();
        correct as f64 / predictions.len() as f64
    }

    /// F1 of one class, 0 when precision and recall are both undefined
    pub fn f1_score(predictions: &[usize], targets: &[usize], class: usize) -> f64 {
        let true_positives = predictions
            .iter()
            .zip(targets)
            .filter(|(&p, &t)| p == class && t == class)
            .count() as f64;
        let predicted = predictions.iter().filter(|&&p| p == class).count() as f64;
        let actual = targets.iter().filter(|&&t| t == class).count() as f64;

        if predicted == 0.0 || actual == 0.0 || true_positives == 0.0 {
            return 0.0;
        }
        let precision = true_positives / predicted;
        let recall = true_positives / actual;
        2.0 * precision * recall / (precision + recall)
    }

    /// Per-class F1 averaged with weights equal to each class's support
    pub fn weighted_f1(predictions: &[usize], targets: &[usize]) -> f64 {
        if predictions.len() != targets.len() || targets.is_empty() {
            return 0.0;
        }
        let mut support: HashMap<usize, usize> = HashMap::new();
        for &t in targets {
            *support.entry(t).or_insert(0) += 1;
        }
        let weighted: f64 = support
            .iter()
            .map(|(&class, &count)| count as f64 * Self::f1_score(predictions, targets, class))
            .sum();
        weighted / targets.len() as f64
    }

    /// Area under the ROC curve via the rank-sum statistic, ties averaged
    ///
    /// `None` when either class is missing.
    pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
        if scores.len() != labels.len() {
            return None;
        }
        let n_pos = labels.iter().filter(|&&l| l).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return None;
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

        let mut positive_rank_sum = 0.0;
        let mut start = 0;
        while start < order.len() {
            let mut end = start;
            while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
                end += 1;
            }
            // ranks are 1-based; tied entries share the mean rank
            let rank = (start + end) as f64 / 2.0 + 1.0;
            for &idx in &order[start..=end] {
                if labels[idx] {
                    positive_rank_sum += rank;
                }
            }
            start = end + 1;
        }

        let n_pos = n_pos as f64;
        let n_neg = n_neg as f64;
        Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
    }

    /// Row-wise argmax
    pub fn argmax_rows(logits: &Array2<f64>) -> Vec<usize> {
        logits
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (j, &v)| {
                        if v > best.1 {
                            (j, v)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }

    /// Accuracy of argmax predictions restricted to `mask`
    pub fn masked_accuracy(logits: &Array2<f64>, labels: &[usize], mask: &[bool]) -> f64 {
        let (predictions, targets) = Self::masked_predictions(logits, labels, mask);
        Self::accuracy(&predictions, &targets)
    }

    /// Argmax predictions and targets of the rows selected by `mask`
    pub fn masked_predictions(
        logits: &Array2<f64>,
        labels: &[usize],
        mask: &[bool],
    ) -> (Vec<usize>, Vec<usize>) {
        Self::argmax_rows(logits)
            .into_iter()
            .zip(labels)
            .zip(mask)
            .filter(|(_, &keep)| keep)
            .map(|((p, &t), _)| (p, t))
            .unzip()
    }
}
