//! Undirected neighbor lists used for message passing

/// Symmetric adjacency without self-loops
#[derive(Debug, Clone, PartialEq)]
pub struct Adjacency {
    neighbors: Vec<Vec<usize>>,
    num_edges: usize,
}

impl Adjacency {
    /// Build from undirected pairs; duplicates, self-loops and out-of-range
    /// endpoints are dropped
    pub fn from_edges(num_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let mut neighbors = vec![Vec::new(); num_nodes];
        for &(a, b) in edges {
            if a == b || a >= num_nodes || b >= num_nodes {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        let mut num_edges = 0;
        for list in neighbors.iter_mut() {
            list.sort_unstable();
            list.dedup();
            num_edges += list.len();
        }
        Self {
            neighbors,
            num_edges: num_edges / 2,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.neighbors.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.neighbors[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors[node].len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        a < self.neighbors.len() && self.neighbors[a].binary_search(&b).is_ok()
    }
}
