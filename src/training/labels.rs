//! Node labels for classification
//!
//! Event graphs carry no ground truth, so labels are synthesized: k-means
//! cluster ids when the feature vectors are wide enough, uniform random
//! classes otherwise. Both are placeholders that exercise the training loop;
//! accuracy against them says nothing about real event categories.

use hashbrown::HashSet;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Feature widths above this are clustered
pub const CLUSTER_FEATURE_THRESHOLD: usize = 10;
/// Class count of random placeholder labels
pub const RANDOM_LABEL_CLASSES: usize = 3;
const MIN_CLUSTERS: usize = 2;
const MAX_CLUSTERS: usize = 5;
const KMEANS_RESTARTS: usize = 10;
const KMEANS_MAX_ITER: usize = 300;
/// Seed of the clustering, fixed so labels do not depend on the run seed
const KMEANS_SEED: u64 = 42;

/// Where labels came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelSource {
    /// Ground truth stored with the graph
    Provided,
    /// Synthetic: k-means cluster ids
    Clustered { k: usize },
    /// Synthetic: uniform random classes
    Random { classes: usize },
}

impl LabelSource {
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, LabelSource::Provided)
    }
}

/// One class id per node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLabels {
    pub values: Vec<usize>,
    pub source: LabelSource,
}

impl NodeLabels {
    pub fn provided(values: Vec<usize>) -> Self {
        Self {
            values,
            source: LabelSource::Provided,
        }
    }

    /// Ground truth when present, synthetic labels otherwise
    pub fn for_graph(x: &Array2<f64>, provided: Option<&[usize]>, rng: &mut StdRng) -> Self {
        match provided {
            Some(values) if values.len() == x.nrows() => Self::provided(values.to_vec()),
            _ => Self::synthesize(x, rng),
        }
    }

    pub fn synthesize(x: &Array2<f64>, rng: &mut StdRng) -> Self {
        let n = x.nrows();
        if x.ncols() > CLUSTER_FEATURE_THRESHOLD && n > 0 {
            let k = cluster_count(n).min(n);
            let kmeans = KMeans::new(k).fit(x);
            info!("Synthetic labels: k-means with {} clusters", k);
            Self {
                values: kmeans.labels,
                source: LabelSource::Clustered { k },
            }
        } else {
            info!("Synthetic labels: {} random classes", RANDOM_LABEL_CLASSES);
            Self {
                values: (0..n).map(|_| rng.gen_range(0..RANDOM_LABEL_CLASSES)).collect(),
                source: LabelSource::Random {
                    classes: RANDOM_LABEL_CLASSES,
                },
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct classes actually present
    pub fn num_classes(&self) -> usize {
        self.values.iter().collect::<HashSet<_>>().len()
    }

    /// Output width needed to score every label id
    pub fn width(&self) -> usize {
        self.values.iter().max().map_or(0, |&m| m + 1)
    }
}

/// `node_count / 10` clamped to [2, 5]
pub fn cluster_count(node_count: usize) -> usize {
    (node_count / 10).clamp(MIN_CLUSTERS, MAX_CLUSTERS)
}

/// Lloyd's k-means with k-means++ seeding and restarts
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    restarts: usize,
    max_iter: usize,
    seed: u64,
}

/// Best clustering over all restarts
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centers: Array2<f64>,
    pub labels: Vec<usize>,
    pub inertia: f64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            restarts: KMEANS_RESTARTS,
            max_iter: KMEANS_MAX_ITER,
            seed: KMEANS_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&self, x: &Array2<f64>) -> KMeansFit {
        if x.nrows() == 0 {
            return KMeansFit {
                centers: Array2::zeros((0, x.ncols())),
                labels: Vec::new(),
                inertia: 0.0,
            };
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for restart in 0..self.restarts {
            let fit = self.fit_once(x, &mut rng);
            debug!("k-means restart {}: inertia {:.4}", restart, fit.inertia);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.unwrap_or_else(|| self.fit_once(x, &mut rng))
    }

    fn fit_once(&self, x: &Array2<f64>, rng: &mut StdRng) -> KMeansFit {
        let n = x.nrows();
        let mut centers = self.init_centers(x, rng);
        let mut labels = vec![0; n];

        for _ in 0..self.max_iter {
            let mut changed = false;
            for (i, row) in x.rows().into_iter().enumerate() {
                let (nearest, _) = nearest_center(&row, &centers);
                if nearest != labels[i] {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            let mut sums = Array2::<f64>::zeros(centers.raw_dim());
            let mut counts = vec![0usize; self.k];
            for (i, row) in x.rows().into_iter().enumerate() {
                sums.row_mut(labels[i]).scaled_add(1.0, &row);
                counts[labels[i]] += 1;
            }
            for (c, &count) in counts.iter().enumerate() {
                // empty clusters keep their previous center
                if count > 0 {
                    centers.row_mut(c).assign(&(&sums.row(c) / count as f64));
                }
            }

            if !changed {
                break;
            }
        }

        let inertia = x
            .rows()
            .into_iter()
            .map(|row| nearest_center(&row, &centers).1)
            .sum::<f64>();
        KMeansFit {
            centers,
            labels,
            inertia,
        }
    }

    /// k-means++: each next center is drawn proportional to squared distance
    fn init_centers(&self, x: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = x.nrows();
        let mut centers = Array2::<f64>::zeros((self.k, x.ncols()));
        centers.row_mut(0).assign(&x.row(rng.gen_range(0..n)));

        let mut dist: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| squared_distance(&row, &centers.row(0)))
            .collect();

        for c in 1..self.k {
            let total = dist.sum();
            let chosen = if total > 0.0 {
                let mut target = rng.gen::<f64>() * total;
                let mut pick = n - 1;
                for (i, &d) in dist.iter().enumerate() {
                    if target < d {
                        pick = i;
                        break;
                    }
                    target -= d;
                }
                pick
            } else {
                rng.gen_range(0..n)
            };
            centers.row_mut(c).assign(&x.row(chosen));
            for (i, row) in x.rows().into_iter().enumerate() {
                let d = squared_distance(&row, &centers.row(c));
                if d < dist[i] {
                    dist[i] = d;
                }
            }
        }
        centers
    }
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of and squared distance to the closest center
fn nearest_center(row: &ArrayView1<f64>, centers: &Array2<f64>) -> (usize, f64) {
    centers
        .rows()
        .into_iter()
        .enumerate()
        .map(|(c, center)| (c, squared_distance(row, &center)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Axis};

    fn blobs() -> Array2<f64> {
        // two well separated groups of 10 points in 12 dimensions
        Array2::from_shape_fn((20, 12), |(i, j)| {
            let base = if i < 10 { 0.0 } else { 10.0 };
            base + ((i * 12 + j) as f64 * 0.7).sin() * 0.1
        })
    }

    #[test]
    fn test_cluster_count() {
        assert_eq!(cluster_count(5), 2);
        assert_eq!(cluster_count(35), 3);
        assert_eq!(cluster_count(1000), 5);
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let fit = KMeans::new(2).fit(&blobs());
        let first = fit.labels[0];
        assert!(fit.labels[..10].iter().all(|&l| l == first));
        assert!(fit.labels[10..].iter().all(|&l| l != first));

        // inertia of the true blob partition around its own means
        let x = blobs();
        let expected: f64 = [x.slice(s![..10, ..]), x.slice(s![10.., ..])]
            .iter()
            .map(|blob| {
                let mean = blob.mean_axis(Axis(0)).unwrap();
                blob.rows()
                    .into_iter()
                    .map(|row| (&row - &mean).mapv(|v| v * v).sum())
                    .sum::<f64>()
            })
            .sum();
        assert!((fit.inertia - expected).abs() < 1e-9);
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let a = KMeans::new(3).fit(&blobs());
        let b = KMeans::new(3).fit(&blobs());
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_wide_features_are_clustered() {
        let mut rng = StdRng::seed_from_u64(0);
        let labels = NodeLabels::synthesize(&blobs(), &mut rng);
        assert_eq!(labels.source, LabelSource::Clustered { k: 2 });
        assert_eq!(labels.num_classes(), 2);
        assert!(labels.source.is_synthetic());
    }

    #[test]
    fn test_narrow_features_get_random_labels() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::zeros((40, 5));
        let labels = NodeLabels::synthesize(&x, &mut rng);
        assert_eq!(labels.source, LabelSource::Random { classes: 3 });
        assert!(labels.values.iter().all(|&l| l < 3));
        assert!(labels.num_classes() <= 3);
        assert!(labels.width() <= 3);
    }

    #[test]
    fn test_provided_labels_win() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::zeros((3, 20));
        let labels = NodeLabels::for_graph(&x, Some(&[1, 0, 1]), &mut rng);
        assert_eq!(labels.source, LabelSource::Provided);
        assert_eq!(labels.width(), 2);
    }
}
