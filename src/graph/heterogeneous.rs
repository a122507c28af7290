//! Heterogeneous event / organizer / venue graph

use hashbrown::{HashMap, HashSet};
use ndarray::{arr2, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{EdgeType, GraphData, NodeAttributes, NodeType};
use crate::data::{Column, EventRecord, EventTable};
use crate::error::Result;
use crate::features::{CategoricalEncoders, FeatureSet, LabelEncoder, UNKNOWN};
use crate::utils::FreeFlagDefault;

/// Width of organizer / venue feature vectors
pub const ENTITY_FEATURES: usize = 3;

/// Independently indexed node space of one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpace {
    pub node_type: NodeType,
    /// Node names; index = node id
    pub names: Vec<String>,
    /// `[event count, mean free-flag, distinct categories]` per node
    pub x: Array2<f64>,
}

impl NodeSpace {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Typed multi-entity graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeteroGraph {
    /// Event features, the full concatenated vector
    pub event_x: Array2<f64>,
    pub event_attrs: Vec<NodeAttributes>,
    pub organizers: NodeSpace,
    pub venues: NodeSpace,
    /// event -> organizer
    pub organized_by: Vec<(usize, usize)>,
    /// event -> venue
    pub located_at: Vec<(usize, usize)>,
}

impl HeteroGraph {
    pub fn num_events(&self) -> usize {
        self.event_x.nrows()
    }

    pub fn num_nodes(&self, node_type: NodeType) -> usize {
        match node_type {
            NodeType::Event => self.num_events(),
            NodeType::Organizer => self.organizers.len(),
            NodeType::Venue => self.venues.len(),
        }
    }

    pub fn edges(&self, edge_type: EdgeType) -> &[(usize, usize)] {
        match edge_type {
            EdgeType::OrganizedBy => &self.organized_by,
            EdgeType::LocatedAt => &self.located_at,
        }
    }

    pub fn stats(&self) -> HeteroStats {
        HeteroStats {
            event_nodes: self.num_events(),
            organizer_nodes: self.organizers.len(),
            venue_nodes: self.venues.len(),
            event_org_edges: self.organized_by.len(),
            event_venue_edges: self.located_at.len(),
        }
    }

    /// Events linked when they share an organizer or a venue
    ///
    /// Follows the event-organizer-event and event-venue-event metapaths; the
    /// edge weight counts how many relations the pair shares.
    pub fn event_projection(&self, name: impl Into<String>) -> GraphData {
        let mut weights: HashMap<(usize, usize), f64> = HashMap::new();

        for edge_type in EdgeType::all() {
            let mut by_target: HashMap<usize, Vec<usize>> = HashMap::new();
            for &(event, target) in self.edges(edge_type) {
                by_target.entry(target).or_default().push(event);
            }
            for events in by_target.values() {
                for (a_pos, &a) in events.iter().enumerate() {
                    for &b in &events[a_pos + 1..] {
                        if a != b {
                            *weights.entry((a.min(b), a.max(b))).or_insert(0.0) += 1.0;
                        }
                    }
                }
            }
        }

        let mut pairs: Vec<((usize, usize), f64)> = weights.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut graph = GraphData::new(name, self.event_x.clone());
        graph.node_attrs = self.event_attrs.clone();
        for ((a, b), w) in pairs {
            graph.add_edge(a, b, w);
        }
        graph
    }
}

/// Per-type node counts and per-relation edge counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeteroStats {
    pub event_nodes: usize,
    pub organizer_nodes: usize,
    pub venue_nodes: usize,
    pub event_org_edges: usize,
    pub event_venue_edges: usize,
}

/// Builds a [`HeteroGraph`] from the table and its fitted encoders
#[derive(Debug, Clone, Default)]
pub struct HeterogeneousGraphBuilder {
    free_default: FreeFlagDefault,
}

impl HeterogeneousGraphBuilder {
    pub fn new(free_default: FreeFlagDefault) -> Self {
        Self { free_default }
    }

    pub fn build(&self, table: &EventTable, features: &FeatureSet) -> Result<HeteroGraph> {
        let event_x = features.concatenated()?;

        let (organizers, organized_by) =
            self.entity_space(table, &features.encoders, Column::Organizer, NodeType::Organizer);
        let (venues, located_at) =
            self.entity_space(table, &features.encoders, Column::Location, NodeType::Venue);

        let graph = HeteroGraph {
            event_x,
            event_attrs: NodeAttributes::from_table(table),
            organizers,
            venues,
            organized_by,
            located_at,
        };

        let stats = graph.stats();
        info!(
            "Heterogeneous graph: {} events, {} organizers, {} venues, {} + {} edges",
            stats.event_nodes,
            stats.organizer_nodes,
            stats.venue_nodes,
            stats.event_org_edges,
            stats.event_venue_edges
        );
        Ok(graph)
    }

    /// Node space for one entity column and the edges into it
    ///
    /// Node ids are the encoder codes, so an event gets an edge exactly when
    /// its value resolves through the encoder.
    fn entity_space(
        &self,
        table: &EventTable,
        encoders: &CategoricalEncoders,
        column: Column,
        node_type: NodeType,
    ) -> (NodeSpace, Vec<(usize, usize)>) {
        let placeholder = unknown_name(node_type);
        let records = table.records();

        let encoder = match encoders.get(column) {
            Some(encoder) if table.has(column) => encoder,
            _ => {
                warn!("Column '{}' absent, using a single {} node", column, placeholder);
                let all: Vec<&EventRecord> = records.iter().collect();
                let x = arr2(&[self.summarize(&all)]);
                let space = NodeSpace {
                    node_type,
                    names: vec![placeholder.to_string()],
                    x,
                };
                return (space, Vec::new());
            }
        };

        let edges: Vec<(usize, usize)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| encoder.transform(r.text(column)).map(|code| (i, code)))
            .collect();

        let space = self.space_from_encoder(encoder, &edges, records, node_type);
        (space, edges)
    }

    fn space_from_encoder(
        &self,
        encoder: &LabelEncoder,
        edges: &[(usize, usize)],
        records: &[EventRecord],
        node_type: NodeType,
    ) -> NodeSpace {
        let mut members: Vec<Vec<&EventRecord>> = vec![Vec::new(); encoder.len()];
        for &(event, node) in edges {
            members[node].push(&records[event]);
        }

        let mut x = Array2::zeros((encoder.len(), ENTITY_FEATURES));
        for (node, events) in members.iter().enumerate() {
            for (j, value) in self.summarize(events).into_iter().enumerate() {
                x[[node, j]] = value;
            }
        }

        let names = encoder
            .classes()
            .iter()
            .map(|c| {
                if c == UNKNOWN {
                    unknown_name(node_type).to_string()
                } else {
                    c.clone()
                }
            })
            .collect();

        NodeSpace {
            node_type,
            names,
            x,
        }
    }

    fn summarize(&self, events: &[&EventRecord]) -> [f64; ENTITY_FEATURES] {
        if events.is_empty() {
            return [0.0; ENTITY_FEATURES];
        }
        let count = events.len() as f64;
        let free = events
            .iter()
            .map(|e| match e.is_free {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => self.free_default.value(),
            })
            .sum::<f64>()
            / count;
        let categories: HashSet<&str> = events
            .iter()
            .map(|e| e.category.as_deref().unwrap_or(UNKNOWN))
            .collect();
        [count, free, categories.len() as f64]
    }
}

/// Name of the node that collects missing values
pub fn unknown_name(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Organizer => "Unknown_Organizer",
        NodeType::Venue => "Unknown_Venue",
        NodeType::Event => "Unknown_Event",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnSet;
    use crate::features::FeatureEngineer;

    fn table() -> EventTable {
        let records = vec![
            EventRecord::new(0, "Jazz", "live")
                .with_organizer("MKC")
                .with_location("Skopje")
                .with_category("Music")
                .with_free(true),
            EventRecord::new(1, "Rock", "loud")
                .with_organizer("MKC")
                .with_location("Bitola")
                .with_category("Music")
                .with_free(false),
            EventRecord::new(2, "Film", "drama")
                .with_location("Skopje")
                .with_category("Film"),
        ];
        let columns = ColumnSet::empty()
            .with(Column::Title)
            .with(Column::Description)
            .with(Column::Category)
            .with(Column::Organizer)
            .with(Column::Location)
            .with(Column::IsFree);
        EventTable::new(records, columns)
    }

    fn build(table: &EventTable) -> HeteroGraph {
        let features = FeatureEngineer::default().build(table);
        HeterogeneousGraphBuilder::default().build(table, &features).unwrap()
    }

    #[test]
    fn test_nodes_and_edges() {
        let graph = build(&table());
        let stats = graph.stats();
        assert_eq!(stats.event_nodes, 3);
        assert_eq!(graph.organizers.names, vec!["MKC", "Unknown_Organizer"]);
        assert_eq!(stats.venue_nodes, 2);
        assert_eq!(stats.event_org_edges, 3);
        assert_eq!(stats.event_venue_edges, 3);

        let unknown = graph.organizers.index_of("Unknown_Organizer").unwrap();
        let targeting: Vec<_> = graph
            .organized_by
            .iter()
            .filter(|(_, o)| *o == unknown)
            .collect();
        assert_eq!(targeting, vec![&(2, unknown)]);
    }

    #[test]
    fn test_entity_features() {
        let graph = build(&table());
        let mkc = graph.organizers.index_of("MKC").unwrap();
        assert_eq!(graph.organizers.x.row(mkc).to_vec(), vec![2.0, 0.5, 1.0]);

        let skopje = graph.venues.index_of("Skopje").unwrap();
        assert_eq!(graph.venues.x.row(skopje).to_vec(), vec![2.0, 0.5, 2.0]);
    }

    #[test]
    fn test_absent_column_gives_single_node_without_edges() {
        let records = vec![EventRecord::new(0, "a", "b"), EventRecord::new(1, "c", "d")];
        let table = EventTable::new(records, ColumnSet::empty().with(Column::Title));
        let graph = build(&table);
        assert_eq!(graph.organizers.names, vec!["Unknown_Organizer"]);
        assert_eq!(graph.venues.names, vec!["Unknown_Venue"]);
        assert!(graph.organized_by.is_empty());
        assert!(graph.located_at.is_empty());
        assert_eq!(graph.organizers.x.row(0)[0], 2.0);
    }

    #[test]
    fn test_event_projection() {
        let graph = build(&table());
        let projection = graph.event_projection("heterogeneous");
        assert_eq!(projection.num_nodes(), 3);
        // 0-1 share MKC, 0-2 share Skopje
        assert_eq!(projection.edges, vec![(0, 1), (0, 2)]);
    }
}
