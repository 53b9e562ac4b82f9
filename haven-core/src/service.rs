//! Client-facing routing operations.
//!
//! Reads go cache first and fall back to solving on a fresh snapshot;
//! mutations go through the cache write lock so invalidation is never
//! observed half done.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use geojson::Feature;
use itertools::Itertools;
use log::{debug, info, trace};
use rayon::prelude::*;
use serde::Serialize;

use crate::cache::{CacheStats, Clock, RouteCache};
use crate::config::EngineConfig;
use crate::directory::{NetworkShelterDirectory, ShelterDirectory};
use crate::loading::{MirrorHandle, MirrorWrite};
use crate::model::network::by_distance;
use crate::model::{Edge, Node, NodeCategory, NodeId, NodeUpdate, Route};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::routing::{TraversalPolicy, solve};
use crate::safety::SafetyManager;
use crate::store::GraphStore;
use crate::Error;

/// Route to one evacuation candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationRoute {
    pub shelter_id: NodeId,
    pub remaining_capacity: Option<u32>,
    pub route: Route,
}

/// Route from the node closest to a position to the closest usable shelter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelterRoute {
    pub origin: NodeId,
    pub shelter: Node,
    /// Great-circle distance from the queried position to the shelter
    pub distance_km: f64,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDistance {
    pub node: Node,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub total_nodes: usize,
    pub unsafe_nodes: usize,
    pub total_edges: usize,
    pub blocked_edges: usize,
    pub cache: CacheStats,
}

pub struct RouteService {
    store: Arc<GraphStore>,
    cache: Arc<RouteCache>,
    safety: SafetyManager,
    notifier: ChangeNotifier,
    mirror: MirrorHandle,
    shelters: Arc<dyn ShelterDirectory>,
}

impl fmt::Debug for RouteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteService")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .field("subscribers", &self.notifier.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl RouteService {
    pub fn builder(store: Arc<GraphStore>) -> RouteServiceBuilder {
        RouteServiceBuilder {
            store,
            config: EngineConfig::default(),
            mirror: MirrorHandle::disabled(),
            shelters: None,
            clock: None,
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<RouteCache> {
        &self.cache
    }

    pub fn safety(&self) -> &SafetyManager {
        &self.safety
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    /// Shortest route that avoids unsafe nodes and blocked roads.
    ///
    /// An unreachable destination yields [`Route::no_path`].
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if either endpoint does not exist
    pub fn find_safest_route(&self, start: &str, end: &str) -> Result<Route, Error> {
        self.lookup(start, end).map(|(route, _)| route)
    }

    /// Marks `hazards` unsafe and returns the route that results.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] for a missing endpoint or hazard, in which case
    /// nothing is marked
    pub fn recalculate_route(
        &self,
        start: &str,
        end: &str,
        hazards: &[NodeId],
    ) -> Result<Route, Error> {
        let snapshot = self.store.snapshot();
        for id in [start, end] {
            if !snapshot.contains_node(id) {
                return Err(Error::UnknownNode(id.to_string()));
            }
        }
        drop(snapshot);

        let marked = self.safety.mark_all_unsafe(hazards)?;
        debug!("Recalculating {start} -> {end} after {marked} new hazards");

        let (route, from_cache) = self.lookup(start, end)?;
        // A miss already announced the fresh route
        if from_cache {
            self.notifier
                .publish(ChangeEvent::route_recalculated(start, end, &route));
        }
        Ok(route)
    }

    /// Routes from `origin` to each candidate shelter, nearest reachable
    /// first.
    ///
    /// Unknown candidates and shelters reported full are left out. Reachable
    /// routes are ordered by distance, then unreachable ones follow; ties keep
    /// the candidate order. Repeated candidates are ranked once. An empty
    /// `candidates` list means every shelter of the directory.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownNode`] if `origin` does not exist
    pub fn get_evacuation_routes(
        &self,
        origin: &str,
        candidates: &[NodeId],
    ) -> Result<Vec<EvacuationRoute>, Error> {
        if !self.store.snapshot().contains_node(origin) {
            return Err(Error::UnknownNode(origin.to_string()));
        }

        let listed;
        let candidates = if candidates.is_empty() {
            listed = self.shelters.list_shelters();
            listed.as_slice()
        } else {
            candidates
        };

        let candidates: Vec<&NodeId> = candidates.iter().unique().collect();
        let mut routes: Vec<EvacuationRoute> = candidates
            .par_iter()
            .filter_map(|shelter_id| {
                let remaining_capacity = self.shelters.remaining_capacity(shelter_id);
                if remaining_capacity == Some(0) {
                    trace!("Skipping full shelter {shelter_id}");
                    return None;
                }
                match self.find_safest_route(origin, shelter_id) {
                    Ok(route) => Some(EvacuationRoute {
                        shelter_id: (*shelter_id).clone(),
                        remaining_capacity,
                        route,
                    }),
                    Err(err) => {
                        trace!("Skipping evacuation candidate {shelter_id}: {err}");
                        None
                    }
                }
            })
            .collect();

        routes.sort_by(|a, b| by_reachable_distance(&a.route, &b.route));
        debug!(
            "Ranked {} of {} evacuation candidates from {origin}",
            routes.len(),
            candidates.len()
        );
        Ok(routes)
    }

    /// Route from the node nearest to the position to the nearest safe shelter
    /// with places left that can actually be reached.
    ///
    /// Shelters are tried by great-circle distance from the position. When
    /// none is reachable the nearest one is returned with [`Route::no_path`].
    ///
    /// # Errors
    ///
    /// [`Error::NoShelterAvailable`] if the network is empty or no shelter
    /// qualifies
    pub fn find_route_to_nearest_shelter(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ShelterRoute, Error> {
        let no_shelter = || Error::NoShelterAvailable {
            latitude,
            longitude,
        };
        let snapshot = self.store.snapshot();
        let (origin, _) = snapshot
            .nearest_node(latitude, longitude)
            .ok_or_else(no_shelter)?;

        let eligible = snapshot
            .nodes_by_category(NodeCategory::Shelter)
            .into_iter()
            .filter(|node| node.is_safe && !self.shelters.is_full(&node.id));

        let mut nearest_unreachable = None;
        for (shelter, distance_m) in by_distance(eligible, latitude, longitude) {
            let candidate = ShelterRoute {
                origin: origin.id.clone(),
                shelter: shelter.clone(),
                distance_km: distance_m / 1000.0,
                route: self.find_safest_route(&origin.id, &shelter.id)?,
            };
            if candidate.route.is_reachable() {
                debug!(
                    "Nearest shelter to ({latitude}, {longitude}) is {} via {}",
                    shelter.id, origin.id
                );
                return Ok(candidate);
            }
            trace!("Shelter {} is unreachable from {}", shelter.id, origin.id);
            nearest_unreachable.get_or_insert(candidate);
        }
        nearest_unreachable.ok_or_else(no_shelter)
    }

    /// Safest route rendered as a GeoJSON feature
    pub fn route_geojson(&self, start: &str, end: &str) -> Result<Feature, Error> {
        let route = self.find_safest_route(start, end)?;
        route.to_geojson(&self.store.snapshot())
    }

    pub fn mark_node_unsafe(&self, node_id: &str) -> Result<bool, Error> {
        self.safety.mark_unsafe(node_id)
    }

    pub fn mark_node_safe(&self, node_id: &str) -> Result<bool, Error> {
        self.safety.mark_safe(node_id)
    }

    pub fn set_edge_blocked(&self, edge_id: &str, blocked: bool) -> Result<bool, Error> {
        self.safety.mark_edge_blocked(edge_id, blocked)
    }

    /// Registers a node. No cached route can depend on a node that did not
    /// exist, so nothing is invalidated.
    pub fn create_node(&self, node: Node) -> Result<Node, Error> {
        {
            let _cache = self.cache.lock_for_mutation();
            self.store.create_node(node.clone())?;
            self.mirror.send(MirrorWrite::Node(node.clone()));
        }
        info!("Created node {} ({:?})", node.id, node.category);
        Ok(node)
    }

    pub fn update_node(&self, node_id: &str, update: &NodeUpdate) -> Result<Node, Error> {
        let node = {
            let _cache = self.cache.lock_for_mutation();
            let node = self.store.update_node(node_id, update)?;
            self.mirror.send(MirrorWrite::Node(node.clone()));
            node
        };
        info!("Updated node {node_id}");
        Ok(node)
    }

    /// Inserts or replaces an edge. A new or cheaper road can shorten any
    /// route, so the whole cache is dropped.
    pub fn create_edge(&self, edge: Edge) -> Result<Edge, Error> {
        {
            let mut cache = self.cache.lock_for_mutation();
            let previous = self.store.upsert_edge(edge.clone())?;
            let dropped = cache.clear();
            debug!(
                "Edge {} {}, dropped {dropped} cached routes",
                edge.id,
                if previous.is_some() { "replaced" } else { "added" }
            );
            self.mirror.send(MirrorWrite::Edge(edge.clone()));
        }
        info!("Upserted edge {} ({} -> {})", edge.id, edge.source, edge.target);
        Ok(edge)
    }

    /// Removes a node together with its roads
    pub fn remove_node(&self, node_id: &str) -> Result<Node, Error> {
        let (node, edges) = {
            let mut cache = self.cache.lock_for_mutation();
            let (node, edges) = self.store.remove_node(node_id)?;
            cache.invalidate(node_id);
            for edge in &edges {
                cache.invalidate(&edge.id);
            }
            self.mirror.send(MirrorWrite::RemoveNode(node.id.clone()));
            (node, edges)
        };
        info!("Removed node {node_id} and {} edges", edges.len());
        Ok(node)
    }

    pub fn remove_edge(&self, edge_id: &str) -> Result<Edge, Error> {
        let edge = {
            let mut cache = self.cache.lock_for_mutation();
            let edge = self.store.remove_edge(edge_id)?;
            cache.invalidate(edge_id);
            self.mirror.send(MirrorWrite::RemoveEdge(edge.id.clone()));
            edge
        };
        info!("Removed edge {edge_id}");
        Ok(edge)
    }

    pub fn all_nodes(&self) -> Vec<Node> {
        self.store.snapshot().nodes().cloned().collect()
    }

    pub fn all_edges(&self) -> Vec<Edge> {
        self.store.snapshot().edges().cloned().collect()
    }

    pub fn safe_nodes(&self) -> Vec<Node> {
        self.store
            .snapshot()
            .safe_nodes()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Nodes within `radius_km` of the position, nearest first
    pub fn nodes_in_area(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<NodeDistance> {
        self.store
            .snapshot()
            .nodes_within(latitude, longitude, radius_km)
            .into_iter()
            .map(|(node, distance_m)| NodeDistance {
                node: node.clone(),
                distance_km: distance_m / 1000.0,
            })
            .collect()
    }

    /// Drops expired cache entries, returning how many were removed
    pub fn cleanup_expired_routes(&self) -> usize {
        let removed = self.cache.sweep_expired();
        if removed > 0 {
            info!("Removed {removed} expired routes from cache");
        }
        removed
    }

    pub fn network_status(&self) -> NetworkStatus {
        let snapshot = self.store.snapshot();
        NetworkStatus {
            total_nodes: snapshot.node_count(),
            unsafe_nodes: snapshot.unsafe_node_count(),
            total_edges: snapshot.edge_count(),
            blocked_edges: snapshot.edges().filter(|edge| edge.blocked).count(),
            cache: self.cache.stats(),
        }
    }

    /// Computes the network status and broadcasts it as
    /// [`ChangeEvent::EvacuationStatsUpdated`]
    pub fn publish_network_status(&self) -> NetworkStatus {
        let status = self.network_status();
        self.notifier.publish(ChangeEvent::EvacuationStatsUpdated {
            cached_routes: status.cache.entries,
            safe_routes: status.cache.safe_routes,
            unsafe_routes: status.cache.entries - status.cache.safe_routes,
            total_nodes: status.total_nodes,
            unsafe_nodes: status.unsafe_nodes,
            blocked_edges: status.blocked_edges,
            timestamp: Utc::now(),
        });
        status
    }

    /// Cached or freshly solved route, and whether it came from the cache
    fn lookup(&self, start: &str, end: &str) -> Result<(Route, bool), Error> {
        if let Some(route) = self.cache.get(start, end) {
            debug!("Cache hit for {start} -> {end}");
            return Ok((route, true));
        }

        let epoch = self.cache.epoch();
        let snapshot = self.store.snapshot();
        let route = solve(&snapshot, start, end, TraversalPolicy::AvoidUnsafe)?;
        debug!(
            "Solved {start} -> {end}: {} nodes, distance {}",
            route.path.len(),
            route.total_distance
        );

        self.cache.put_if_current(start, end, route.clone(), epoch);
        self.notifier
            .publish(ChangeEvent::route_recalculated(start, end, &route));
        Ok((route, false))
    }
}

fn by_reachable_distance(a: &Route, b: &Route) -> Ordering {
    match (a.is_reachable(), b.is_reachable()) {
        (true, true) => a.total_distance.total_cmp(&b.total_distance),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

pub struct RouteServiceBuilder {
    store: Arc<GraphStore>,
    config: EngineConfig,
    mirror: MirrorHandle,
    shelters: Option<Arc<dyn ShelterDirectory>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RouteServiceBuilder {
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn mirror(mut self, mirror: MirrorHandle) -> Self {
        self.mirror = mirror;
        self
    }

    /// Shelter directory to consult; defaults to the network's `SHELTER` nodes
    pub fn shelters(mut self, shelters: Arc<dyn ShelterDirectory>) -> Self {
        self.shelters = Some(shelters);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> RouteService {
        let cache = Arc::new(match self.clock {
            Some(clock) => RouteCache::with_clock(self.config.cache_ttl, clock),
            None => RouteCache::new(self.config.cache_ttl),
        });
        let notifier = ChangeNotifier::new(self.config.event_capacity);
        let shelters = self
            .shelters
            .unwrap_or_else(|| Arc::new(NetworkShelterDirectory::new(self.store.clone())));
        let safety = SafetyManager::new(
            self.store.clone(),
            cache.clone(),
            notifier.clone(),
            self.mirror.clone(),
        );
        RouteService {
            store: self.store,
            cache,
            safety,
            notifier,
            mirror: self.mirror,
            shelters,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;

    use super::*;
    use crate::cache::ManualClock;
    use crate::directory::{InMemoryShelterDirectory, ShelterOccupancy};
    use crate::loading::sample_network;
    use crate::model::Network;

    fn sample_store() -> Arc<GraphStore> {
        let sample = sample_network();
        let mut network = Network::new();
        for node in sample.nodes {
            network.insert_node(node).unwrap();
        }
        for edge in sample.edges {
            network.upsert_edge(edge).unwrap();
        }
        Arc::new(GraphStore::from_network(network))
    }

    fn service() -> RouteService {
        RouteService::builder(sample_store()).build()
    }

    fn ids(route: &Route) -> Vec<&str> {
        route.path.iter().map(String::as_str).collect()
    }

    fn ids_of(nodes: &[&str]) -> Vec<NodeId> {
        nodes.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn scenario_safe_network() {
        let route = service().find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&route), ["A", "B", "D"]);
        assert_eq!(route.total_distance, 8.0);
        assert!(route.is_safe);
    }

    #[test]
    fn scenario_hazard_on_shortest_route() {
        let service = service();
        service.find_safest_route("A", "D").unwrap();
        service.mark_node_unsafe("B").unwrap();

        let route = service.find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&route), ["A", "C", "D"]);
        assert_eq!(route.total_distance, 16.0);
        assert!(route.is_safe);
    }

    #[test]
    fn scenario_no_safe_route() {
        let service = service();
        service.mark_node_unsafe("B").unwrap();
        service.mark_node_unsafe("C").unwrap();

        let route = service.find_safest_route("A", "D").unwrap();
        assert_eq!(route, Route::no_path());
    }

    #[test]
    fn scenario_unknown_destination_is_not_cached() {
        let service = service();
        let err = service.find_safest_route("A", "Z").unwrap_err();
        assert!(matches!(err, Error::UnknownNode(id) if id == "Z"));
        assert!(service.cache().is_empty());
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let service = service();
        let mut events = service.subscribe();

        let first = service.find_safest_route("A", "E").unwrap();
        let second = service.find_safest_route("A", "E").unwrap();
        assert_eq!(first, second);
        assert_eq!(ids(&first), ["A", "B", "D", "E"]);

        // Only the miss is announced
        assert_eq!(events.try_recv().unwrap().kind(), "RouteRecalculated");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn restoring_a_node_brings_back_the_short_route() {
        let service = service();
        service.mark_node_unsafe("B").unwrap();
        assert_eq!(service.find_safest_route("A", "D").unwrap().total_distance, 16.0);

        service.mark_node_safe("B").unwrap();
        assert_eq!(service.find_safest_route("A", "D").unwrap().total_distance, 8.0);
    }

    #[test]
    fn blocked_road_is_avoided_until_reopened() {
        let service = service();
        service.set_edge_blocked("B-D", true).unwrap();
        let route = service.find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&route), ["A", "C", "D"]);

        service.set_edge_blocked("B-D", false).unwrap();
        let route = service.find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&route), ["A", "B", "D"]);
    }

    #[test]
    fn recalculate_marks_hazards_and_announces_route() {
        let service = service();
        service.find_safest_route("A", "D").unwrap();
        let mut events = service.subscribe();

        let route = service
            .recalculate_route("A", "D", &ids_of(&["B"]))
            .unwrap();
        assert_eq!(ids(&route), ["A", "C", "D"]);

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.kind())
            .collect();
        assert_eq!(kinds, ["NodeSafetyChanged", "RouteRecalculated"]);
    }

    #[test]
    fn recalculate_with_unknown_hazard_marks_nothing() {
        let service = service();
        let err = service
            .recalculate_route("A", "D", &ids_of(&["B", "Q"]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(id) if id == "Q"));
        assert!(service.store().node("B").unwrap().is_safe);
    }

    #[test]
    fn recalculate_on_cached_route_still_announces() {
        let service = service();
        service.find_safest_route("A", "C").unwrap();
        let mut events = service.subscribe();

        // E is not on A -> C, so the cached route survives
        service.recalculate_route("A", "C", &ids_of(&["E"])).unwrap();
        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.kind())
            .collect();
        assert_eq!(kinds, ["NodeSafetyChanged", "RouteRecalculated"]);
    }

    #[test]
    fn evacuation_routes_are_ranked_by_distance() {
        let service = service();
        let routes = service
            .get_evacuation_routes("A", &ids_of(&["E", "Z", "D"]))
            .unwrap();
        let shelters: Vec<_> = routes.iter().map(|r| r.shelter_id.as_str()).collect();
        assert_eq!(shelters, ["D", "E"]);
        assert_eq!(routes[0].route.total_distance, 8.0);
        assert_eq!(routes[1].route.total_distance, 12.0);
    }

    #[test]
    fn repeated_candidates_are_ranked_once() {
        let routes = service()
            .get_evacuation_routes("A", &ids_of(&["E", "D", "E", "D"]))
            .unwrap();
        let shelters: Vec<_> = routes.iter().map(|r| r.shelter_id.as_str()).collect();
        assert_eq!(shelters, ["D", "E"]);
    }

    #[test]
    fn unreachable_shelters_come_last() {
        let service = service();
        service.mark_node_unsafe("D").unwrap();
        let routes = service.get_evacuation_routes("A", &[]).unwrap();
        let shelters: Vec<_> = routes.iter().map(|r| r.shelter_id.as_str()).collect();
        assert_eq!(shelters, ["E", "D"]);
        assert_eq!(ids(&routes[0].route), ["A", "B", "E"]);
        assert!(!routes[1].route.is_reachable());
    }

    #[test]
    fn full_shelters_are_skipped() {
        let directory = Arc::new(InMemoryShelterDirectory::new());
        directory.set_occupancy("D", ShelterOccupancy { capacity: 20, occupied: 20 });
        directory.set_occupancy("E", ShelterOccupancy { capacity: 20, occupied: 5 });
        let service = RouteService::builder(sample_store())
            .shelters(directory)
            .build();

        let routes = service.get_evacuation_routes("A", &[]).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].shelter_id, "E");
        assert_eq!(routes[0].remaining_capacity, Some(15));

        let nearest = service.find_route_to_nearest_shelter(6.9271, 79.8612).unwrap();
        assert_eq!(nearest.shelter.id, "E");
    }

    #[test]
    fn evacuation_from_unknown_origin_is_an_error() {
        assert!(matches!(
            service().get_evacuation_routes("Z", &[]),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn nearest_shelter_skips_unsafe_shelters() {
        let service = service();
        let nearest = service.find_route_to_nearest_shelter(6.9271, 79.8612).unwrap();
        assert_eq!(nearest.origin, "A");
        assert_eq!(nearest.shelter.id, "D");
        assert_eq!(ids(&nearest.route), ["A", "B", "D"]);

        service.mark_node_unsafe("D").unwrap();
        let nearest = service.find_route_to_nearest_shelter(6.9271, 79.8612).unwrap();
        assert_eq!(nearest.shelter.id, "E");
        assert_eq!(ids(&nearest.route), ["A", "B", "E"]);
        assert_eq!(nearest.route.total_distance, 20.0);
    }

    #[test]
    fn nearest_shelter_without_roads_is_passed_over() {
        let service = service();
        service
            .create_node(Node::new("F", 6.9272, 79.8612).with_category(NodeCategory::Shelter))
            .unwrap();

        let nearest = service.find_route_to_nearest_shelter(6.9271, 79.8612).unwrap();
        assert_eq!(nearest.shelter.id, "D");
        assert_eq!(ids(&nearest.route), ["A", "B", "D"]);

        service.mark_node_unsafe("D").unwrap();
        service.mark_node_unsafe("E").unwrap();
        let nearest = service.find_route_to_nearest_shelter(6.9271, 79.8612).unwrap();
        assert_eq!(nearest.shelter.id, "F");
        assert!(!nearest.route.is_reachable());
    }

    #[test]
    fn no_shelter_available() {
        let service = service();
        service.mark_node_unsafe("D").unwrap();
        service.mark_node_unsafe("E").unwrap();
        assert!(matches!(
            service.find_route_to_nearest_shelter(6.9271, 79.8612),
            Err(Error::NoShelterAvailable { .. })
        ));

        let empty = RouteService::builder(Arc::new(GraphStore::new())).build();
        assert!(matches!(
            empty.find_route_to_nearest_shelter(0.0, 0.0),
            Err(Error::NoShelterAvailable { .. })
        ));
    }

    #[test]
    fn new_edge_clears_cached_routes() {
        let service = service();
        service.find_safest_route("A", "E").unwrap();
        service.create_edge(Edge::new("A", "E", 1.0)).unwrap();

        let route = service.find_safest_route("A", "E").unwrap();
        assert_eq!(ids(&route), ["A", "E"]);
        assert_eq!(route.total_distance, 1.0);
    }

    #[test]
    fn removing_a_node_drops_routes_through_it() {
        let service = service();
        service.find_safest_route("A", "D").unwrap();
        service.find_safest_route("A", "B").unwrap();

        service.remove_node("B").unwrap();
        assert!(service.cache().get("A", "D").is_none());
        assert_eq!(service.find_safest_route("A", "D").unwrap().total_distance, 16.0);
        assert!(matches!(
            service.find_safest_route("A", "B"),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn removing_an_edge_drops_routes_over_it() {
        let service = service();
        service.find_safest_route("A", "D").unwrap();
        service.remove_edge("B-D").unwrap();
        assert_eq!(service.find_safest_route("A", "D").unwrap().total_distance, 16.0);
        assert!(matches!(
            service.remove_edge("B-D"),
            Err(Error::UnknownEdge(_))
        ));
    }

    #[test]
    fn topology_changes_are_seen_by_cached_lookups() {
        let service = service();
        let cached = service.find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&cached), ["A", "B", "D"]);

        let epoch = service.cache().epoch();
        service.remove_edge("B-D").unwrap();
        assert!(service.cache().epoch() > epoch);

        let route = service.find_safest_route("A", "D").unwrap();
        assert_eq!(ids(&route), ["A", "C", "D"]);
        assert!(route.edges.iter().all(|edge| service.store().edge(&edge.id).is_some()));

        let epoch = service.cache().epoch();
        service.create_edge(Edge::new("B", "D", 3.0)).unwrap();
        assert!(service.cache().epoch() > epoch);
        assert_eq!(ids(&service.find_safest_route("A", "D").unwrap()), ["A", "B", "D"]);
    }

    #[test]
    fn node_administration() {
        let service = service();
        let created = service
            .create_node(Node::new("F", 6.93, 79.85).with_category(NodeCategory::Hospital))
            .unwrap();
        assert_eq!(created.name, "F");
        assert!(matches!(
            service.create_node(Node::new("F", 0.0, 0.0)),
            Err(Error::AlreadyExists(_))
        ));

        let update = NodeUpdate {
            name: Some("Field hospital".into()),
            ..NodeUpdate::default()
        };
        let updated = service.update_node("F", &update).unwrap();
        assert_eq!(updated.name, "Field hospital");
        assert_eq!(service.all_nodes().len(), 6);

        service.mark_node_unsafe("F").unwrap();
        assert_eq!(service.safe_nodes().len(), 5);
    }

    #[test]
    fn nodes_in_area_are_nearest_first() {
        let nodes = service().nodes_in_area(6.9218, 79.8553, 1.0);
        let found: Vec<_> = nodes.iter().map(|n| n.node.id.as_str()).collect();
        assert_eq!(found, ["D", "A"]);
        assert_eq!(nodes[0].distance_km, 0.0);
    }

    #[test]
    fn expired_routes_are_recomputed_and_cleaned_up() {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let service = RouteService::builder(sample_store())
            .clock(clock.clone())
            .build();
        service.find_safest_route("A", "D").unwrap();
        service.find_safest_route("A", "E").unwrap();

        clock.advance(Duration::from_secs(60 * 60));
        assert_eq!(service.cleanup_expired_routes(), 2);
        assert!(service.cache().is_empty());

        let mut events = service.subscribe();
        service.find_safest_route("A", "D").unwrap();
        assert_eq!(events.try_recv().unwrap().kind(), "RouteRecalculated");
    }

    #[test]
    fn network_status_is_published() {
        let service = service();
        service.find_safest_route("A", "D").unwrap();
        service.mark_node_unsafe("C").unwrap();
        service.set_edge_blocked("D-E", true).unwrap();
        let mut events = service.subscribe();

        let status = service.publish_network_status();
        assert_eq!(status.total_nodes, 5);
        assert_eq!(status.unsafe_nodes, 1);
        assert_eq!(status.blocked_edges, 1);
        assert_eq!(status.cache.entries, 1);

        match events.try_recv().unwrap() {
            ChangeEvent::EvacuationStatsUpdated {
                cached_routes,
                safe_routes,
                unsafe_nodes,
                ..
            } => {
                assert_eq!(cached_routes, 1);
                assert_eq!(safe_routes, 1);
                assert_eq!(unsafe_nodes, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn route_as_geojson() {
        let feature = service().route_geojson("A", "D").unwrap();
        let properties = feature.properties.unwrap();
        assert_eq!(properties["totalDistance"], 8.0);
        assert!(feature.geometry.is_some());
    }
}
