use std::collections::BinaryHeap;

use hashbrown::HashMap;
use log::trace;
use petgraph::stable_graph::NodeIndex;

use super::state::State;
use crate::model::{Edge, Network, Node, Route};
use crate::Error;

/// Which network elements a route may pass through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalPolicy {
    /// Skip blocked edges and unsafe nodes. The start node is exempt so that
    /// a route out of a hazard zone can still be found.
    #[default]
    AvoidUnsafe,
    /// Skip blocked edges only
    BlockedOnly,
}

impl TraversalPolicy {
    fn admits(self, node: &Node) -> bool {
        match self {
            TraversalPolicy::AvoidUnsafe => node.is_safe,
            TraversalPolicy::BlockedOnly => true,
        }
    }
}

/// Shortest route between two nodes of a network snapshot.
///
/// Returns [`Route::no_path`] when `end` cannot be reached; only a missing
/// endpoint is an error.
///
/// # Errors
///
/// [`Error::UnknownNode`] if `start` or `end` is not in the network.
pub fn solve(
    network: &Network,
    start: &str,
    end: &str,
    policy: TraversalPolicy,
) -> Result<Route, Error> {
    let start_ix = network
        .index_of(start)
        .ok_or_else(|| Error::UnknownNode(start.to_string()))?;
    let end_ix = network
        .index_of(end)
        .ok_or_else(|| Error::UnknownNode(end.to_string()))?;

    if start_ix == end_ix {
        let is_safe = network.node_at(start_ix).is_some_and(|node| node.is_safe);
        return Ok(Route::stay(start.to_string(), is_safe));
    }

    let estimated_nodes = network.node_count().min(1000);
    let mut distances: HashMap<NodeIndex, f64> = HashMap::with_capacity(estimated_nodes);
    let mut predecessors: HashMap<NodeIndex, (NodeIndex, &Edge)> =
        HashMap::with_capacity(estimated_nodes);
    let mut heap = BinaryHeap::with_capacity(estimated_nodes / 4);
    let mut seq = 0_u64;

    // Start node has distance 0
    heap.push(State {
        cost: 0.0,
        seq,
        node: start_ix,
    });
    distances.insert(start_ix, 0.0);

    while let Some(State { cost, node, .. }) = heap.pop() {
        // Distance to the target is final once it is popped
        if node == end_ix {
            break;
        }

        // Skip if we've found a better path
        if let Some(&best) = distances.get(&node) {
            if cost > best {
                continue;
            }
        }

        for (next, edge) in network.arcs(node) {
            if edge.blocked {
                continue;
            }
            if !network.node_at(next).is_some_and(|n| policy.admits(n)) {
                continue;
            }
            let next_cost = cost + edge.weight;

            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                    } else {
                        continue;
                    }
                }
            }
            seq += 1;
            heap.push(State {
                cost: next_cost,
                seq,
                node: next,
            });
            predecessors.insert(next, (node, edge));
        }
    }

    let Some(&total_distance) = distances.get(&end_ix) else {
        trace!("No route from {start} to {end} under {policy:?}");
        return Ok(Route::no_path());
    };

    // Follow predecessors backward from target to start
    let mut path_ix = vec![end_ix];
    let mut edges = Vec::new();
    let mut current = end_ix;
    while current != start_ix {
        let Some(&(prev, edge)) = predecessors.get(&current) else {
            break;
        };
        edges.push(edge.clone());
        path_ix.push(prev);
        current = prev;
    }
    path_ix.reverse();
    edges.reverse();

    let nodes: Vec<&Node> = path_ix
        .iter()
        .filter_map(|&ix| network.node_at(ix))
        .collect();
    let is_safe = nodes.iter().all(|node| node.is_safe) && edges.iter().all(|edge| !edge.blocked);

    Ok(Route {
        path: nodes.into_iter().map(|node| node.id.clone()).collect(),
        edges,
        total_distance,
        is_safe,
    })
}
