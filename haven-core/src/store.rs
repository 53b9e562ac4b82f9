//! Authoritative in-memory road network.
//!
//! Readers get an `Arc<Network>` snapshot that never changes underneath them.
//! Writers copy the network on write only while a snapshot is still held.
//! Mutations are crate-private: they go through the route service or the
//! safety manager, which invalidate cached routes under the same lock.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::Error;
use crate::model::{Edge, Network, Node, NodeCategory, NodeUpdate};

/// Shared road network.
///
/// Outside the crate the store is read-only; topology changes go through
/// [`RouteService`](crate::RouteService) so cached routes never outlive them:
///
/// ```compile_fail
/// let store = haven_core::GraphStore::new();
/// store.remove_edge("A-B");
/// ```
#[derive(Debug, Default)]
pub struct GraphStore {
    network: RwLock<Arc<Network>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_network(network: Network) -> Self {
        Self {
            network: RwLock::new(Arc::new(network)),
        }
    }

    /// Immutable view of the whole network at this instant
    pub fn snapshot(&self) -> Arc<Network> {
        Arc::clone(&self.network.read())
    }

    pub fn version(&self) -> u64 {
        self.network.read().version()
    }

    pub fn node(&self, id: &str) -> Option<Node> {
        self.network.read().node(id).cloned()
    }

    pub fn edge(&self, id: &str) -> Option<Edge> {
        self.network.read().edge(id).cloned()
    }

    pub fn nodes_by_category(&self, category: NodeCategory) -> Vec<Node> {
        self.snapshot()
            .nodes_by_category(category)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Nearest node by great-circle distance, first registered wins on ties
    pub fn nearest_node(&self, latitude: f64, longitude: f64) -> Option<Node> {
        self.snapshot()
            .nearest_node(latitude, longitude)
            .map(|(node, _)| node.clone())
    }

    /// # Errors
    ///
    /// [`Error::AlreadyExists`] for a duplicate id, [`Error::InvalidData`]
    /// for out of range coordinates.
    pub(crate) fn create_node(&self, node: Node) -> Result<(), Error> {
        if self.network.read().contains_node(&node.id) {
            return Err(Error::AlreadyExists(node.id));
        }
        self.mutate(|network| network.insert_node(node))
    }

    pub(crate) fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<Node, Error> {
        self.mutate(|network| network.update_node(id, update).cloned())
    }

    /// Removes a node and its incident edges, returning both
    pub(crate) fn remove_node(&self, id: &str) -> Result<(Node, Vec<Edge>), Error> {
        self.mutate(|network| network.remove_node(id))
    }

    /// # Errors
    ///
    /// [`Error::InvalidReference`] if an endpoint does not exist,
    /// [`Error::InvalidData`] for a negative or non-finite weight.
    pub(crate) fn upsert_edge(&self, edge: Edge) -> Result<Option<Edge>, Error> {
        self.mutate(|network| network.upsert_edge(edge))
    }

    pub(crate) fn remove_edge(&self, id: &str) -> Result<Edge, Error> {
        self.mutate(|network| network.remove_edge(id))
    }

    pub(crate) fn set_node_safety(&self, id: &str, is_safe: bool) -> Result<bool, Error> {
        match self.network.read().node(id) {
            None => return Err(Error::UnknownNode(id.to_string())),
            Some(node) if node.is_safe == is_safe => return Ok(false),
            Some(_) => {}
        }
        self.mutate(|network| network.set_node_safety(id, is_safe))
    }

    pub(crate) fn set_edge_blocked(&self, id: &str, blocked: bool) -> Result<bool, Error> {
        match self.network.read().edge(id) {
            None => return Err(Error::UnknownEdge(id.to_string())),
            Some(edge) if edge.blocked == blocked => return Ok(false),
            Some(_) => {}
        }
        self.mutate(|network| network.set_edge_blocked(id, blocked))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Network) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.network.write();
        f(Arc::make_mut(&mut guard))
    }
}
