//! Event graphs
//!
//! - [`SimilarityGraphBuilder`]: events linked by TF-IDF cosine similarity
//! - [`HeterogeneousGraphBuilder`]: events, organizers and venues with typed relations
//! - [`GraphStore`]: JSON persistence plus run metadata

mod adjacency;
mod heterogeneous;
mod schema;
mod similarity;
mod store;

pub use adjacency::Adjacency;
pub use heterogeneous::{
    unknown_name, HeteroGraph, HeteroStats, HeterogeneousGraphBuilder, NodeSpace, ENTITY_FEATURES,
};
pub use schema::{EdgeType, NodeType};
pub use similarity::{
    cosine_similarity_matrix, SimilarityGraph, SimilarityGraphBuilder, SimilarityMatrix,
    SimilaritySource,
};
pub use store::{GraphMetadata, GraphStatistics, GraphStore, StoredGraph};

use crate::data::{Column, EventTable};
use crate::features::UNKNOWN;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Descriptive attributes of an event node
///
/// Optional fields are `None` when the source table lacks the column and
/// `"Unknown"` when the column exists but the value is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub node_id: usize,
    pub title: String,
    pub category: Option<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
}

impl NodeAttributes {
    /// One attribute record per table row
    pub fn from_table(table: &EventTable) -> Vec<Self> {
        let attr = |present: bool, value: Option<&str>| {
            present.then(|| value.unwrap_or(UNKNOWN).to_string())
        };
        table
            .records()
            .iter()
            .enumerate()
            .map(|(idx, r)| NodeAttributes {
                node_id: r.node_id,
                title: if r.title.is_empty() {
                    format!("Event_{}", idx)
                } else {
                    r.title.clone()
                },
                category: attr(table.has(Column::Category), r.category.as_deref()),
                organizer: attr(table.has(Column::Organizer), r.organizer.as_deref()),
                location: attr(table.has(Column::Location), r.location.as_deref()),
            })
            .collect()
    }
}

/// Homogeneous graph ready for training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub name: String,
    /// Node feature matrix, one row per node
    pub x: Array2<f64>,
    /// Undirected edges stored once with `i < j`
    pub edges: Vec<(usize, usize)>,
    pub edge_weight: Vec<f64>,
    #[serde(default)]
    pub node_attrs: Vec<NodeAttributes>,
    /// Ground-truth node labels, when the source provides them
    #[serde(default)]
    pub labels: Option<Vec<usize>>,
}

impl GraphData {
    pub fn new(name: impl Into<String>, x: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            x,
            edges: Vec::new(),
            edge_weight: Vec::new(),
            node_attrs: Vec::new(),
            labels: None,
        }
    }

    /// Add an undirected edge, normalized to `i < j`; self-loops are ignored
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        if a == b {
            return;
        }
        self.edges.push((a.min(b), a.max(b)));
        self.edge_weight.push(weight);
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn adjacency(&self) -> Adjacency {
        Adjacency::from_edges(self.num_nodes(), &self.edges)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats::compute(self.num_nodes(), self.num_edges())
    }
}

/// Size and connectivity summary of a homogeneous graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    /// edges / max possible undirected edges
    pub density: f64,
    pub avg_degree: f64,
}

impl GraphStats {
    pub fn compute(nodes: usize, edges: usize) -> Self {
        let max_possible = nodes * nodes.saturating_sub(1) / 2;
        let density = if max_possible > 0 {
            edges as f64 / max_possible as f64
        } else {
            0.0
        };
        let avg_degree = if nodes > 0 {
            (2 * edges) as f64 / nodes as f64
        } else {
            0.0
        };
        Self {
            nodes,
            edges,
            density,
            avg_degree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ColumnSet, EventRecord};

    #[test]
    fn test_stats() {
        let stats = GraphStats::compute(4, 3);
        assert_eq!(stats.density, 0.5);
        assert_eq!(stats.avg_degree, 1.5);
        assert_eq!(GraphStats::compute(1, 0).density, 0.0);
        assert_eq!(GraphStats::compute(0, 0).avg_degree, 0.0);
    }

    #[test]
    fn test_add_edge_normalizes() {
        let mut graph = GraphData::new("g", Array2::zeros((3, 2)));
        graph.add_edge(2, 0, 0.4);
        graph.add_edge(1, 1, 1.0);
        assert_eq!(graph.edges, vec![(0, 2)]);
        assert_eq!(graph.edge_weight, vec![0.4]);
    }

    #[test]
    fn test_node_attributes() {
        let table = EventTable::new(
            vec![
                EventRecord::new(7, "", "").with_category("Music"),
                EventRecord::new(8, "Jazz", ""),
            ],
            ColumnSet::empty().with(Column::Title).with(Column::Category),
        );
        let attrs = NodeAttributes::from_table(&table);
        assert_eq!(attrs[0].title, "Event_0");
        assert_eq!(attrs[0].node_id, 7);
        assert_eq!(attrs[1].category.as_deref(), Some("Unknown"));
        assert_eq!(attrs[1].organizer, None);
    }
}
