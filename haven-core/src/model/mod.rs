//! Data model for evacuation routing
//!
//! Contains the road network graph, its components and route values.

pub mod components;
pub mod network;
pub mod route;

pub use components::{Edge, EdgeId, Node, NodeCategory, NodeId, NodeUpdate, RoadCategory, edge_id};
pub use network::Network;
pub use route::Route;
