pub use crate::{EngineConfig, Error};

// Engine components
pub use crate::cache::{Clock, RouteCache};
pub use crate::notify::{ChangeEvent, ChangeNotifier};
pub use crate::service::{EvacuationRoute, RouteService, ShelterRoute};
pub use crate::store::GraphStore;

// Network and route values
pub use crate::model::{Edge, Network, Node, NodeCategory, NodeUpdate, RoadCategory, Route};
pub use crate::routing::{TraversalPolicy, solve};

// Adapters
pub use crate::directory::{InMemoryShelterDirectory, ShelterDirectory};
pub use crate::loading::{
    DurableMirror, InMemoryMirror, JsonFileMirror, create_route_service, seed_if_empty,
};
