//! Road network graph with id lookups
//!
//! `Network` is the value handed out as a snapshot: all reads are public,
//! all mutations are crate-private and go through [`crate::GraphStore`].

use geo::{Distance, Haversine, Point};
use hashbrown::HashMap;
use petgraph::{
    Direction,
    stable_graph::{EdgeIndex, NodeIndex, StableDiGraph},
    visit::EdgeRef,
};

use super::components::{Edge, EdgeId, Node, NodeCategory, NodeId, NodeUpdate};
use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: StableDiGraph<Node, Edge>,
    node_lookup: HashMap<NodeId, NodeIndex>,
    edge_lookup: HashMap<EdgeId, EdgeIndex>,
    version: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter bumped by every effective mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_lookup.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_lookup
            .get(id)
            .and_then(|&ix| self.graph.node_weight(ix))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_lookup
            .get(id)
            .and_then(|&ix| self.graph.edge_weight(ix))
    }

    /// Nodes in iteration order (registration order, with freed slots reused)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn nodes_by_category(&self, category: NodeCategory) -> Vec<&Node> {
        self.nodes().filter(|node| node.category == category).collect()
    }

    pub fn safe_nodes(&self) -> Vec<&Node> {
        self.nodes().filter(|node| node.is_safe).collect()
    }

    pub fn unsafe_node_count(&self) -> usize {
        self.nodes().filter(|node| !node.is_safe).count()
    }

    /// Nearest node by great-circle distance, with the distance in meters.
    ///
    /// Ties go to the node met first in iteration order.
    pub fn nearest_node(&self, latitude: f64, longitude: f64) -> Option<(&Node, f64)> {
        nearest_of(self.nodes(), latitude, longitude)
    }

    /// Nodes within `radius_km` of a point, nearest first
    pub fn nodes_within(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<(&Node, f64)> {
        let radius_m = radius_km * 1000.0;
        let mut found = by_distance(self.nodes(), latitude, longitude);
        found.retain(|(_, distance)| *distance <= radius_m);
        found
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_lookup.get(id).copied()
    }

    pub(crate) fn node_at(&self, ix: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(ix)
    }

    /// Arcs leaving `ix`: outgoing edges plus incoming bidirectional ones.
    pub(crate) fn arcs(&self, ix: NodeIndex) -> impl Iterator<Item = (NodeIndex, &Edge)> {
        let outgoing = self
            .graph
            .edges_directed(ix, Direction::Outgoing)
            .map(|edge| (edge.target(), edge.weight()));
        let incoming = self
            .graph
            .edges_directed(ix, Direction::Incoming)
            .filter(|edge| edge.weight().bidirectional)
            .map(|edge| (edge.source(), edge.weight()));
        outgoing.chain(incoming)
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> Result<(), Error> {
        if self.node_lookup.contains_key(&node.id) {
            return Err(Error::AlreadyExists(node.id));
        }
        validate_coordinates(node.latitude, node.longitude)?;
        let id = node.id.clone();
        let ix = self.graph.add_node(node);
        self.node_lookup.insert(id, ix);
        self.version += 1;
        Ok(())
    }

    pub(crate) fn update_node(&mut self, id: &str, update: &NodeUpdate) -> Result<&Node, Error> {
        let ix = self
            .index_of(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        let current = &self.graph[ix];
        let latitude = update.latitude.unwrap_or(current.latitude);
        let longitude = update.longitude.unwrap_or(current.longitude);
        validate_coordinates(latitude, longitude)?;

        let node = &mut self.graph[ix];
        node.latitude = latitude;
        node.longitude = longitude;
        if let Some(name) = &update.name {
            node.name.clone_from(name);
        }
        self.version += 1;
        Ok(&self.graph[ix])
    }

    /// Removes a node with its incident edges
    pub(crate) fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>), Error> {
        let ix = self
            .node_lookup
            .remove(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;

        let incident: Vec<EdgeIndex> = self
            .graph
            .edges_directed(ix, Direction::Outgoing)
            .chain(self.graph.edges_directed(ix, Direction::Incoming))
            .map(|edge| edge.id())
            .collect();

        let mut removed_edges = Vec::with_capacity(incident.len());
        for edge_ix in incident {
            // self-loops show up in both directions
            if let Some(edge) = self.graph.remove_edge(edge_ix) {
                self.edge_lookup.remove(&edge.id);
                removed_edges.push(edge);
            }
        }

        let node = self
            .graph
            .remove_node(ix)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        self.version += 1;
        Ok((node, removed_edges))
    }

    /// Inserts or replaces an edge, returning the replaced one
    pub(crate) fn upsert_edge(&mut self, edge: Edge) -> Result<Option<Edge>, Error> {
        if !edge.weight.is_finite() || edge.weight < 0.0 {
            return Err(Error::InvalidData(format!(
                "Edge {} has invalid weight {}",
                edge.id, edge.weight
            )));
        }
        let source = self.endpoint(&edge, &edge.source)?;
        let target = self.endpoint(&edge, &edge.target)?;

        let previous = self
            .edge_lookup
            .remove(&edge.id)
            .and_then(|ix| self.graph.remove_edge(ix));

        let id = edge.id.clone();
        let ix = self.graph.add_edge(source, target, edge);
        self.edge_lookup.insert(id, ix);
        self.version += 1;
        Ok(previous)
    }

    pub(crate) fn remove_edge(&mut self, id: &str) -> Result<Edge, Error> {
        let edge = self
            .edge_lookup
            .remove(id)
            .and_then(|ix| self.graph.remove_edge(ix))
            .ok_or_else(|| Error::UnknownEdge(id.to_string()))?;
        self.version += 1;
        Ok(edge)
    }

    /// Returns whether the flag actually changed
    pub(crate) fn set_node_safety(&mut self, id: &str, is_safe: bool) -> Result<bool, Error> {
        let ix = self
            .index_of(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        let node = &mut self.graph[ix];
        if node.is_safe == is_safe {
            return Ok(false);
        }
        node.is_safe = is_safe;
        self.version += 1;
        Ok(true)
    }

    /// Returns whether the flag actually changed
    pub(crate) fn set_edge_blocked(&mut self, id: &str, blocked: bool) -> Result<bool, Error> {
        let ix = *self
            .edge_lookup
            .get(id)
            .ok_or_else(|| Error::UnknownEdge(id.to_string()))?;
        let edge = &mut self.graph[ix];
        if edge.blocked == blocked {
            return Ok(false);
        }
        edge.blocked = blocked;
        self.version += 1;
        Ok(true)
    }

    fn endpoint(&self, edge: &Edge, node: &str) -> Result<NodeIndex, Error> {
        self.index_of(node).ok_or_else(|| Error::InvalidReference {
            edge: edge.id.clone(),
            node: node.to_string(),
        })
    }
}

/// `nodes` with their distance in metres, nearest first. Equal distances
/// keep iteration order.
pub(crate) fn by_distance<'a>(
    nodes: impl Iterator<Item = &'a Node>,
    latitude: f64,
    longitude: f64,
) -> Vec<(&'a Node, f64)> {
    let origin = Point::new(longitude, latitude);
    let mut ranked: Vec<(&Node, f64)> = nodes
        .map(|node| (node, Haversine.distance(origin, node.geometry())))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

/// Nearest node among `nodes`, first one wins on equal distance
fn nearest_of<'a>(
    nodes: impl Iterator<Item = &'a Node>,
    latitude: f64,
    longitude: f64,
) -> Option<(&'a Node, f64)> {
    let origin = Point::new(longitude, latitude);
    nodes.fold(None, |best, node| {
        let distance = Haversine.distance(origin, node.geometry());
        match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((node, distance)),
        }
    })
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), Error> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::InvalidData(format!(
            "Coordinates out of range: ({latitude}, {longitude})"
        )));
    }
    Ok(())
}
