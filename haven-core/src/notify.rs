//! Fan-out of safety and routing changes to live subscribers.
//!
//! Delivery is best effort: a subscriber that lags behind the channel
//! capacity loses the oldest events, and publishing with nobody listening
//! is not an error for the operation that produced the event.

use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::Error;
use crate::model::{EdgeId, NodeId, Route};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChangeEvent {
    NodeSafetyChanged {
        node_id: NodeId,
        is_safe: bool,
        timestamp: DateTime<Utc>,
    },
    EdgeBlockedChanged {
        edge_id: EdgeId,
        blocked: bool,
        timestamp: DateTime<Utc>,
    },
    RouteRecalculated {
        start: NodeId,
        end: NodeId,
        path: Vec<NodeId>,
        total_distance: f64,
        is_safe: bool,
        timestamp: DateTime<Utc>,
    },
    EvacuationStatsUpdated {
        cached_routes: usize,
        safe_routes: usize,
        unsafe_routes: usize,
        total_nodes: usize,
        unsafe_nodes: usize,
        blocked_edges: usize,
        timestamp: DateTime<Utc>,
    },
}

impl ChangeEvent {
    pub fn node_safety_changed(node_id: &str, is_safe: bool) -> Self {
        ChangeEvent::NodeSafetyChanged {
            node_id: node_id.to_string(),
            is_safe,
            timestamp: Utc::now(),
        }
    }

    pub fn edge_blocked_changed(edge_id: &str, blocked: bool) -> Self {
        ChangeEvent::EdgeBlockedChanged {
            edge_id: edge_id.to_string(),
            blocked,
            timestamp: Utc::now(),
        }
    }

    pub fn route_recalculated(start: &str, end: &str, route: &Route) -> Self {
        ChangeEvent::RouteRecalculated {
            start: start.to_string(),
            end: end.to_string(),
            path: route.path.clone(),
            total_distance: route.total_distance,
            is_safe: route.is_safe,
            timestamp: Utc::now(),
        }
    }

    /// Name of the variant, used as the event name on streaming transports
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::NodeSafetyChanged { .. } => "NodeSafetyChanged",
            ChangeEvent::EdgeBlockedChanged { .. } => "EdgeBlockedChanged",
            ChangeEvent::RouteRecalculated { .. } => "RouteRecalculated",
            ChangeEvent::EvacuationStatsUpdated { .. } => "EvacuationStatsUpdated",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChangeEvent::NodeSafetyChanged { timestamp, .. }
            | ChangeEvent::EdgeBlockedChanged { timestamp, .. }
            | ChangeEvent::RouteRecalculated { timestamp, .. }
            | ChangeEvent::EvacuationStatsUpdated { timestamp, .. } => *timestamp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes to every current subscriber, returning how many received it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!("Publishing {}", event.kind());
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                let err = Error::NotificationDeliveryFailed(format!(
                    "no subscribers for {}",
                    event.kind()
                ));
                debug!("{err}");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_not_fatal() {
        let notifier = ChangeNotifier::default();
        assert_eq!(notifier.publish(ChangeEvent::node_safety_changed("A", false)), 0);
    }

    #[test]
    fn every_subscriber_receives_events_in_order() {
        let notifier = ChangeNotifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.publish(ChangeEvent::node_safety_changed("B", false));
        notifier.publish(ChangeEvent::edge_blocked_changed("B-D", true));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap().kind(), "NodeSafetyChanged");
            assert_eq!(rx.try_recv().unwrap().kind(), "EdgeBlockedChanged");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ChangeEvent::node_safety_changed("B", false);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "NodeSafetyChanged");
        assert_eq!(json["nodeId"], "B");
        assert_eq!(json["isSafe"], false);
        assert!(json["timestamp"].is_string());

        let back: ChangeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
