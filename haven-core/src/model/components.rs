//! Road network components - locations and road segments

use geo::Point;
use serde::{Deserialize, Serialize};

/// Identifier of a location in the road network
pub type NodeId = String;
/// Identifier of a road segment
pub type EdgeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeCategory {
    Intersection,
    Shelter,
    Hospital,
    #[default]
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadCategory {
    Highway,
    #[default]
    MainRoad,
    SideRoad,
    Footpath,
}

/// Road network node (intersection, shelter, hospital...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: NodeCategory,
    #[serde(default = "default_true")]
    pub is_safe: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, latitude: f64, longitude: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            latitude,
            longitude,
            category: NodeCategory::default(),
            is_safe: true,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: NodeCategory) -> Self {
        self.category = category;
        self
    }

    /// Node location, x = longitude, y = latitude
    pub fn geometry(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    pub fn is_shelter(&self) -> bool {
        self.category == NodeCategory::Shelter
    }
}

/// Partial update of a node location or display name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
}

/// Road segment between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Distance or travel time, never negative
    pub weight: f64,
    #[serde(default)]
    pub road_category: RoadCategory,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
    #[serde(default)]
    pub blocked: bool,
}

impl Edge {
    /// Bidirectional, unblocked main road with an id derived from its endpoints
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, weight: f64) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            source,
            target,
            weight,
            road_category: RoadCategory::default(),
            bidirectional: true,
            blocked: false,
        }
    }

    #[must_use]
    pub fn one_way(mut self) -> Self {
        self.bidirectional = false;
        self
    }

    #[must_use]
    pub fn with_road_category(mut self, category: RoadCategory) -> Self {
        self.road_category = category;
        self
    }

    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.target == node
    }
}

/// Deterministic edge identifier for an endpoint pair
pub fn edge_id(source: &str, target: &str) -> EdgeId {
    format!("{source}-{target}")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_id_is_derived_from_endpoints() {
        let edge = Edge::new("A", "B", 5.0);
        assert_eq!(edge.id, "A-B");
        assert!(edge.bidirectional);
        assert!(!edge.blocked);
    }

    #[test]
    fn node_json_uses_camel_case_and_defaults() {
        let node: Node =
            serde_json::from_str(r#"{"id":"S1","latitude":6.99,"longitude":79.9,"category":"SHELTER"}"#)
                .unwrap();
        assert!(node.is_safe);
        assert!(node.is_shelter());

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["isSafe"], true);
        assert_eq!(json["category"], "SHELTER");
    }

    #[test]
    fn edge_json_defaults_to_open_two_way_road() {
        let edge: Edge = serde_json::from_str(
            r#"{"id":"x","source":"A","target":"B","weight":2.5}"#,
        )
        .unwrap();
        assert!(edge.bidirectional);
        assert!(!edge.blocked);
        assert_eq!(edge.road_category, RoadCategory::MainRoad);
        assert_eq!(serde_json::to_value(&edge).unwrap()["roadCategory"], "MAIN_ROAD");
    }
}
