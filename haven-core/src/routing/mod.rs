//! Safety-aware path search over network snapshots

pub mod dijkstra;
mod to_geojson;

pub use dijkstra::{TraversalPolicy, solve};
