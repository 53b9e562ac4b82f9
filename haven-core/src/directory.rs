//! Shelter directory adapters.
//!
//! Shelter occupancy is owned by an external directory; the engine only asks
//! which shelters exist and how many places each has left.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{NodeCategory, NodeId};
use crate::store::GraphStore;

pub trait ShelterDirectory: Send + Sync {
    /// Node ids of every known shelter
    fn list_shelters(&self) -> Vec<NodeId>;

    /// Free places at the shelter, `None` when the directory does not track it
    fn remaining_capacity(&self, shelter_id: &str) -> Option<u32>;

    fn is_full(&self, shelter_id: &str) -> bool {
        self.remaining_capacity(shelter_id) == Some(0)
    }
}

/// Treats every `SHELTER` node of the network as a shelter of unknown
/// capacity
#[derive(Debug, Clone)]
pub struct NetworkShelterDirectory {
    store: Arc<GraphStore>,
}

impl NetworkShelterDirectory {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl ShelterDirectory for NetworkShelterDirectory {
    fn list_shelters(&self) -> Vec<NodeId> {
        self.store
            .nodes_by_category(NodeCategory::Shelter)
            .into_iter()
            .map(|node| node.id)
            .collect()
    }

    fn remaining_capacity(&self, _shelter_id: &str) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterOccupancy {
    pub capacity: u32,
    pub occupied: u32,
}

impl ShelterOccupancy {
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied)
    }
}

/// Directory holding occupancy figures pushed in by the caller, listing
/// shelters in registration order
#[derive(Debug, Default)]
pub struct InMemoryShelterDirectory {
    shelters: RwLock<(Vec<NodeId>, HashMap<NodeId, ShelterOccupancy>)>,
}

impl InMemoryShelterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_occupancy(&self, shelter_id: impl Into<NodeId>, occupancy: ShelterOccupancy) {
        let shelter_id = shelter_id.into();
        let mut guard = self.shelters.write();
        let (order, figures) = &mut *guard;
        if figures.insert(shelter_id.clone(), occupancy).is_none() {
            order.push(shelter_id);
        }
    }

    pub fn remove(&self, shelter_id: &str) {
        let mut guard = self.shelters.write();
        let (order, figures) = &mut *guard;
        if figures.remove(shelter_id).is_some() {
            order.retain(|id| id != shelter_id);
        }
    }
}

impl ShelterDirectory for InMemoryShelterDirectory {
    fn list_shelters(&self) -> Vec<NodeId> {
        self.shelters.read().0.clone()
    }

    fn remaining_capacity(&self, shelter_id: &str) -> Option<u32> {
        self.shelters
            .read()
            .1
            .get(shelter_id)
            .map(ShelterOccupancy::remaining)
    }
}
