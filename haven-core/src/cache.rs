//! Time-limited memo of computed routes keyed by `(start, end)`.
//!
//! Every invalidation bumps an epoch. A route solved against a snapshot is
//! only stored if no invalidation happened since the epoch was read before
//! taking that snapshot, so a stale computation can never overwrite the
//! effect of a newer hazard.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use hashbrown::HashMap;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use serde::Serialize;

use crate::model::{NodeId, Route};

/// Source of the current time for expiry decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = add_saturating(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRoute {
    pub start: NodeId,
    pub end: NodeId,
    pub route: Route,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedRoute {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether a change to the node or edge `id` can affect this entry
    fn depends_on(&self, id: &str) -> bool {
        self.start == id || self.end == id || self.route.visits(id) || self.route.traverses(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub safe_routes: usize,
    pub unreachable_routes: usize,
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(NodeId, NodeId), CachedRoute>,
    epoch: u64,
}

impl CacheState {
    fn invalidate(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.depends_on(id));
        self.epoch += 1;
        before - self.entries.len()
    }

    fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.epoch += 1;
        dropped
    }
}

pub struct RouteCache {
    state: RwLock<CacheState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RouteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteCache")
            .field("entries", &self.state.read().entries.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RouteCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
            clock,
        }
    }

    /// Cached route for the pair, expired entries are dropped on access
    pub fn get(&self, start: &str, end: &str) -> Option<Route> {
        self.entry(start, end).map(|entry| entry.route)
    }

    pub fn entry(&self, start: &str, end: &str) -> Option<CachedRoute> {
        let key = (start.to_string(), end.to_string());
        let now = self.clock.now();
        {
            let state = self.state.read();
            match state.entries.get(&key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        let mut state = self.state.write();
        if state
            .entries
            .get(&key)
            .is_some_and(|entry| entry.is_expired_at(now))
        {
            trace!("Route {start} -> {end} expired");
            state.entries.remove(&key);
        }
        None
    }

    /// Current invalidation epoch. Read it before taking the snapshot a
    /// route is solved on, then hand it to [`RouteCache::put_if_current`].
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Stores a route unconditionally, replacing any entry for the pair
    pub fn put(&self, start: &str, end: &str, route: Route) {
        let entry = self.new_entry(start, end, route);
        self.state
            .write()
            .entries
            .insert((entry.start.clone(), entry.end.clone()), entry);
    }

    /// Stores a route unless an invalidation happened after `epoch` was read.
    /// Returns whether the route was stored.
    pub fn put_if_current(&self, start: &str, end: &str, route: Route, epoch: u64) -> bool {
        let entry = self.new_entry(start, end, route);
        let mut state = self.state.write();
        if state.epoch != epoch {
            debug!(
                "Discarding route {start} -> {end} solved at epoch {epoch}, cache is at {}",
                state.epoch
            );
            return false;
        }
        state
            .entries
            .insert((entry.start.clone(), entry.end.clone()), entry);
        true
    }

    /// Drops every entry whose key or route involves the node or edge `id`
    pub fn invalidate(&self, id: &str) -> usize {
        self.state.write().invalidate(id)
    }

    pub fn clear(&self) -> usize {
        self.state.write().clear()
    }

    /// Exclusive access for a graph mutation and its invalidation.
    ///
    /// No route can be read from or stored into the cache while the guard
    /// is held.
    pub fn lock_for_mutation(&self) -> CacheMutation<'_> {
        CacheMutation {
            state: self.state.write(),
        }
    }

    /// Removes expired entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts over unexpired entries
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let state = self.state.read();
        let live = state.entries.values().filter(|e| !e.is_expired_at(now));
        let (mut entries, mut safe_routes, mut unreachable_routes) = (0, 0, 0);
        for entry in live {
            entries += 1;
            if entry.route.is_safe {
                safe_routes += 1;
            }
            if !entry.route.is_reachable() {
                unreachable_routes += 1;
            }
        }
        CacheStats {
            entries,
            safe_routes,
            unreachable_routes,
            epoch: state.epoch,
        }
    }

    fn new_entry(&self, start: &str, end: &str, route: Route) -> CachedRoute {
        let computed_at = self.clock.now();
        CachedRoute {
            start: start.to_string(),
            end: end.to_string(),
            route,
            computed_at,
            expires_at: add_saturating(computed_at, self.ttl),
        }
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

/// Write guard held across a graph mutation
pub struct CacheMutation<'a> {
    state: RwLockWriteGuard<'a, CacheState>,
}

impl CacheMutation<'_> {
    pub fn invalidate(&mut self, id: &str) -> usize {
        self.state.invalidate(id)
    }

    pub fn clear(&mut self) -> usize {
        self.state.clear()
    }
}

fn add_saturating(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
