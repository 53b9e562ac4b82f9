//! Safe evacuation routing over a road network whose nodes and roads can
//! become unsafe or blocked at any time.

pub mod cache;
mod config;
pub mod directory;
mod error;
pub mod loading;
pub mod model;
pub mod notify;
pub mod prelude;
pub mod routing;
pub mod safety;
pub mod service;
pub mod store;

pub use cache::{CachedRoute, Clock, RouteCache, SystemClock};
pub use config::EngineConfig;
pub use error::Error;
pub use model::{Edge, EdgeId, Network, Node, NodeCategory, NodeId, NodeUpdate, RoadCategory, Route};
pub use notify::{ChangeEvent, ChangeNotifier};
pub use safety::SafetyManager;
pub use service::RouteService;
pub use store::GraphStore;
