mod safe_dijkstra;
mod state;

pub use safe_dijkstra::{TraversalPolicy, solve};
