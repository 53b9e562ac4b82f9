use serde::{Deserialize, Serialize};

use super::components::{Edge, NodeId};

/// Result of a route computation.
///
/// A missing path is a regular value: empty path, no edges and
/// [`Route::NO_PATH_DISTANCE`] as the distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: Vec<NodeId>,
    pub edges: Vec<Edge>,
    pub total_distance: f64,
    pub is_safe: bool,
}

impl Route {
    pub const NO_PATH_DISTANCE: f64 = -1.0;

    pub fn no_path() -> Self {
        Self {
            path: Vec::new(),
            edges: Vec::new(),
            total_distance: Self::NO_PATH_DISTANCE,
            is_safe: false,
        }
    }

    /// Single node route for `start == end`
    pub(crate) fn stay(node: NodeId, is_safe: bool) -> Self {
        Self {
            path: vec![node],
            edges: Vec::new(),
            total_distance: 0.0,
            is_safe,
        }
    }

    pub fn is_reachable(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether the route passes through the node
    pub fn visits(&self, node: &str) -> bool {
        self.path.iter().any(|id| id == node)
    }

    /// Whether the route uses the edge
    pub fn traverses(&self, edge: &str) -> bool {
        self.edges.iter().any(|e| e.id == edge)
    }
}
