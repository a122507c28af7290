//! Node masks and edge splits

use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Disjoint train / validation / test node masks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSplit {
    pub train: Vec<bool>,
    pub val: Vec<bool>,
    pub test: Vec<bool>,
}

impl NodeSplit {
    /// Random permutation cut into `floor(train_ratio * n)`,
    /// `floor(val_ratio * n)` and the remainder
    pub fn random(n: usize, train_ratio: f64, val_ratio: f64, rng: &mut StdRng) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);

        let train_size = ((train_ratio * n as f64) as usize).min(n);
        let val_size = ((val_ratio * n as f64) as usize).min(n - train_size);

        let mut split = Self {
            train: vec![false; n],
            val: vec![false; n],
            test: vec![false; n],
        };
        for (pos, &idx) in indices.iter().enumerate() {
            if pos < train_size {
                split.train[idx] = true;
            } else if pos < train_size + val_size {
                split.val[idx] = true;
            } else {
                split.test[idx] = true;
            }
        }
        split
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let count = |mask: &[bool]| mask.iter().filter(|&&m| m).count();
        (count(&self.train), count(&self.val), count(&self.test))
    }
}

/// Positive and negative edges for transductive link prediction
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSplit {
    /// Message-passing and training positives
    pub train: Vec<(usize, usize)>,
    pub val: Vec<(usize, usize)>,
    pub test: Vec<(usize, usize)>,
    /// Node pairs with no edge in the full graph
    pub val_neg: Vec<(usize, usize)>,
    pub test_neg: Vec<(usize, usize)>,
}

impl EdgeSplit {
    /// Shuffle the undirected edges and hold out `floor(val_ratio * m)` for
    /// validation and `floor(test_ratio * m)` for testing; matching counts of
    /// non-edges are sampled as negatives
    pub fn random(
        num_nodes: usize,
        edges: &[(usize, usize)],
        val_ratio: f64,
        test_ratio: f64,
        rng: &mut StdRng,
    ) -> Self {
        let mut unique: Vec<(usize, usize)> = edges
            .iter()
            .filter(|(a, b)| a != b && *a < num_nodes && *b < num_nodes)
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        unique.sort_unstable();
        unique.shuffle(rng);

        let m = unique.len();
        let n_val = (val_ratio * m as f64) as usize;
        let n_test = ((test_ratio * m as f64) as usize).min(m - n_val);

        let existing: HashSet<(usize, usize)> = unique.iter().copied().collect();
        let mut negatives = sample_non_edges(num_nodes, &existing, n_val + n_test, rng);
        let test_neg = negatives.split_off(n_val.min(negatives.len()));

        let train = unique.split_off(n_val + n_test);
        let test = unique.split_off(n_val);
        Self {
            train,
            val: unique,
            test,
            val_neg: negatives,
            test_neg,
        }
    }
}

/// Up to `count` distinct pairs `i < j` absent from `existing`
pub fn sample_non_edges(
    num_nodes: usize,
    existing: &HashSet<(usize, usize)>,
    count: usize,
    rng: &mut StdRng,
) -> Vec<(usize, usize)> {
    let capacity = (num_nodes * num_nodes.saturating_sub(1) / 2).saturating_sub(existing.len());
    let target = count.min(capacity);
    if target == 0 {
        return Vec::new();
    }

    // dense graphs: enumerate the complement instead of rejecting
    if target * 2 > capacity {
        let mut all: Vec<(usize, usize)> = (0..num_nodes)
            .flat_map(|i| ((i + 1)..num_nodes).map(move |j| (i, j)))
            .filter(|pair| !existing.contains(pair))
            .collect();
        all.shuffle(rng);
        all.truncate(target);
        return all;
    }

    let mut chosen = HashSet::with_capacity(target);
    let mut pairs = Vec::with_capacity(target);
    while pairs.len() < target {
        let a = rng.gen_range(0..num_nodes);
        let b = rng.gen_range(0..num_nodes);
        if a == b {
            continue;
        }
        let pair = (a.min(b), a.max(b));
        if !existing.contains(&pair) && chosen.insert(pair) {
            pairs.push(pair);
        }
    }
    pairs
}

/// `count` uniformly random node pairs, self-pairs allowed
pub fn random_pairs(num_nodes: usize, count: usize, rng: &mut StdRng) -> Vec<(usize, usize)> {
    if num_nodes == 0 {
        return Vec::new();
    }
    (0..count)
        .map(|_| (rng.gen_range(0..num_nodes), rng.gen_range(0..num_nodes)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_node_split_partitions() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [0, 1, 7, 10, 33] {
            let split = NodeSplit::random(n, 0.6, 0.2, &mut rng);
            let (train, val, test) = split.counts();
            assert_eq!(train + val + test, n);
            assert_eq!(train, (0.6 * n as f64) as usize);
            assert_eq!(val, (0.2 * n as f64) as usize);
            for i in 0..n {
                let hits = [split.train[i], split.val[i], split.test[i]]
                    .iter()
                    .filter(|&&m| m)
                    .count();
                assert_eq!(hits, 1);
            }
        }
    }

    #[test]
    fn test_edge_split_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let edges: Vec<(usize, usize)> = (0..20).map(|i| (i, (i + 1) % 20)).collect();
        let split = EdgeSplit::random(20, &edges, 0.1, 0.2, &mut rng);
        assert_eq!(split.val.len(), 2);
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.train.len(), 14);
        assert_eq!(split.val_neg.len(), 2);
        assert_eq!(split.test_neg.len(), 4);

        let positives: HashSet<(usize, usize)> =
            edges.iter().map(|&(a, b)| (a.min(b), a.max(b))).collect();
        for pair in split.val_neg.iter().chain(&split.test_neg) {
            assert!(pair.0 < pair.1);
            assert!(!positives.contains(pair));
        }
    }

    #[test]
    fn test_sample_non_edges_in_dense_graph() {
        let mut rng = StdRng::seed_from_u64(2);
        let existing: HashSet<(usize, usize)> = [(0, 1), (0, 2)].into_iter().collect();
        let pairs = sample_non_edges(3, &existing, 5, &mut rng);
        assert_eq!(pairs, vec![(1, 2)]);
    }

    #[test]
    fn test_random_pairs() {
        let mut rng = StdRng::seed_from_u64(3);
        let pairs = random_pairs(4, 10, &mut rng);
        assert_eq!(pairs.len(), 10);
        assert!(pairs.iter().all(|&(a, b)| a < 4 && b < 4));
        assert!(random_pairs(0, 3, &mut rng).is_empty());
    }
}
