//! Single authority for node safety and edge blockage.
//!
//! Every effective change runs in this order: graph mutation, cache
//! invalidation and the queued mirror write under the cache write lock, then
//! the change event. Re-applying the current state does nothing.

use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};

use crate::cache::{CacheMutation, RouteCache};
use crate::loading::{MirrorHandle, MirrorWrite};
use crate::model::NodeId;
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::store::GraphStore;
use crate::Error;

#[derive(Debug, Clone)]
pub struct SafetyManager {
    store: Arc<GraphStore>,
    cache: Arc<RouteCache>,
    notifier: ChangeNotifier,
    mirror: MirrorHandle,
}

impl SafetyManager {
    pub fn new(
        store: Arc<GraphStore>,
        cache: Arc<RouteCache>,
        notifier: ChangeNotifier,
        mirror: MirrorHandle,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            mirror,
        }
    }

    pub fn mark_unsafe(&self, node_id: &str) -> Result<bool, Error> {
        self.set_node_safety(node_id, false)
    }

    pub fn mark_safe(&self, node_id: &str) -> Result<bool, Error> {
        self.set_node_safety(node_id, true)
    }

    /// Sets the safety flag of a node. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if the node does not exist
    pub fn set_node_safety(&self, node_id: &str, is_safe: bool) -> Result<bool, Error> {
        let changed = {
            let mut cache = self.cache.lock_for_mutation();
            self.apply_node_safety(&mut cache, node_id, is_safe)?
        };
        if changed {
            self.announce_node_safety(node_id, is_safe);
        } else {
            debug!("Node {node_id} already has is_safe={is_safe}");
        }
        Ok(changed)
    }

    /// Sets the blocked flag of an edge. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEdge`] if the edge does not exist
    pub fn mark_edge_blocked(&self, edge_id: &str, blocked: bool) -> Result<bool, Error> {
        let changed = {
            let mut cache = self.cache.lock_for_mutation();
            let changed = self.store.set_edge_blocked(edge_id, blocked)?;
            if changed {
                let dropped = if blocked {
                    cache.invalidate(edge_id)
                } else {
                    cache.clear()
                };
                debug!("Dropped {dropped} cached routes after change to edge {edge_id}");
                if let Some(edge) = self.store.edge(edge_id) {
                    self.mirror.send(MirrorWrite::Edge(edge));
                }
            }
            changed
        };

        if !changed {
            debug!("Edge {edge_id} already has blocked={blocked}");
            return Ok(false);
        }
        info!(
            "Edge {edge_id} {}",
            if blocked { "blocked" } else { "unblocked" }
        );
        self.notifier
            .publish(ChangeEvent::edge_blocked_changed(edge_id, blocked));
        Ok(true)
    }

    /// Marks every node unsafe after checking that all of them exist, as one
    /// step relative to other mutations. Returns how many actually changed.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] naming the first missing id; nothing is marked
    pub fn mark_all_unsafe(&self, node_ids: &[NodeId]) -> Result<usize, Error> {
        let mut changed = Vec::with_capacity(node_ids.len());
        {
            let mut cache = self.cache.lock_for_mutation();
            let snapshot = self.store.snapshot();
            if let Some(missing) = node_ids.iter().find(|id| !snapshot.contains_node(id)) {
                return Err(Error::UnknownNode(missing.clone()));
            }
            for id in node_ids.iter().unique() {
                if self.apply_node_safety(&mut cache, id, false)? {
                    changed.push(id);
                }
            }
        }

        for id in &changed {
            self.announce_node_safety(id, false);
        }
        Ok(changed.len())
    }

    fn apply_node_safety(
        &self,
        cache: &mut CacheMutation<'_>,
        node_id: &str,
        is_safe: bool,
    ) -> Result<bool, Error> {
        let changed = self.store.set_node_safety(node_id, is_safe)?;
        if changed {
            // A node coming back can shorten routes that never touched it
            let dropped = if is_safe {
                cache.clear()
            } else {
                cache.invalidate(node_id)
            };
            debug!("Dropped {dropped} cached routes after change to node {node_id}");
            if let Some(node) = self.store.node(node_id) {
                self.mirror.send(MirrorWrite::Node(node));
            }
        }
        Ok(changed)
    }

    fn announce_node_safety(&self, node_id: &str, is_safe: bool) {
        info!(
            "Node {node_id} marked {}",
            if is_safe { "safe" } else { "unsafe" }
        );
        self.notifier
            .publish(ChangeEvent::node_safety_changed(node_id, is_safe));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Network, Node, Route};

    fn manager() -> (SafetyManager, Arc<RouteCache>, ChangeNotifier) {
        let mut network = Network::new();
        for id in ["A", "B", "C", "D"] {
            network.insert_node(Node::new(id, 0.0, 0.0)).unwrap();
        }
        for (s, t, w) in [("A", "B", 5.0), ("A", "C", 10.0), ("B", "D", 3.0), ("C", "D", 6.0)] {
            network.upsert_edge(Edge::new(s, t, w)).unwrap();
        }
        let store = Arc::new(GraphStore::from_network(network));
        let cache = Arc::new(RouteCache::default());
        let notifier = ChangeNotifier::new(16);
        let manager = SafetyManager::new(
            store,
            cache.clone(),
            notifier.clone(),
            MirrorHandle::disabled(),
        );
        (manager, cache, notifier)
    }

    fn cached(path: &[&str]) -> Route {
        Route {
            path: path.iter().map(|id| id.to_string()).collect(),
            edges: path
                .windows(2)
                .map(|pair| Edge::new(pair[0], pair[1], 1.0))
                .collect(),
            total_distance: 1.0,
            is_safe: true,
        }
    }

    #[test]
    fn marking_unsafe_invalidates_touching_routes_and_notifies() {
        let (manager, cache, notifier) = manager();
        let mut events = notifier.subscribe();
        cache.put("A", "D", cached(&["A", "B", "D"]));
        cache.put("A", "C", cached(&["A", "C"]));

        assert!(manager.mark_unsafe("B").unwrap());
        assert!(cache.get("A", "D").is_none());
        assert!(cache.get("A", "C").is_some());

        match events.try_recv().unwrap() {
            ChangeEvent::NodeSafetyChanged {
                node_id, is_safe, ..
            } => {
                assert_eq!(node_id, "B");
                assert!(!is_safe);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn reapplying_state_is_a_no_op() {
        let (manager, cache, notifier) = manager();
        manager.mark_unsafe("B").unwrap();
        let mut events = notifier.subscribe();
        cache.put("A", "D", cached(&["A", "B", "D"]));

        assert!(!manager.mark_unsafe("B").unwrap());
        assert!(cache.get("A", "D").is_some());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn restoring_a_node_clears_the_cache() {
        let (manager, cache, _) = manager();
        manager.mark_unsafe("B").unwrap();
        cache.put("A", "D", cached(&["A", "C", "D"]));

        assert!(manager.mark_safe("B").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn blocking_an_edge_invalidates_routes_using_it() {
        let (manager, cache, _) = manager();
        cache.put("A", "D", cached(&["A", "B", "D"]));
        cache.put("A", "C", cached(&["A", "C"]));

        assert!(manager.mark_edge_blocked("B-D", true).unwrap());
        assert!(cache.get("A", "D").is_none());
        assert!(cache.get("A", "C").is_some());
        assert!(!manager.mark_edge_blocked("B-D", true).unwrap());
    }

    #[test]
    fn unknown_ids_are_rejected_without_mutation() {
        let (manager, cache, _) = manager();
        cache.put("A", "D", cached(&["A", "B", "D"]));

        let ids = vec!["B".to_string(), "Z".to_string()];
        assert!(matches!(
            manager.mark_all_unsafe(&ids),
            Err(Error::UnknownNode(id)) if id == "Z"
        ));
        assert!(cache.get("A", "D").is_some());
        assert!(matches!(
            manager.mark_edge_blocked("nope", true),
            Err(Error::UnknownEdge(_))
        ));
    }
}
