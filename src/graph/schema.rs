//! Node and relation types of the event graphs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node spaces of the heterogeneous graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Event,
    Organizer,
    Venue,
}

impl NodeType {
    pub fn all() -> Vec<NodeType> {
        vec![NodeType::Event, NodeType::Organizer, NodeType::Venue]
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Event => write!(f, "event"),
            NodeType::Organizer => write!(f, "organizer"),
            NodeType::Venue => write!(f, "venue"),
        }
    }
}

/// Directed relations, always from an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// event -> organizer
    OrganizedBy,
    /// event -> venue
    LocatedAt,
}

impl EdgeType {
    pub fn all() -> Vec<EdgeType> {
        vec![EdgeType::OrganizedBy, EdgeType::LocatedAt]
    }

    /// Relation label without endpoints
    pub fn relation(&self) -> &'static str {
        match self {
            EdgeType::OrganizedBy => "organized_by",
            EdgeType::LocatedAt => "located_at",
        }
    }

    pub fn source(&self) -> NodeType {
        NodeType::Event
    }

    pub fn target(&self) -> NodeType {
        match self {
            EdgeType::OrganizedBy => NodeType::Organizer,
            EdgeType::LocatedAt => NodeType::Venue,
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.source(), self.relation(), self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_display() {
        assert_eq!(EdgeType::OrganizedBy.to_string(), "event-organized_by-organizer");
        assert_eq!(EdgeType::LocatedAt.to_string(), "event-located_at-venue");
    }
}
