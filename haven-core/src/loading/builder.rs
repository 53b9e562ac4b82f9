use std::sync::Arc;

use log::{info, warn};
use tokio::task::JoinHandle;

use super::mirror::{DurableMirror, spawn_mirror_writer};
use crate::model::Network;
use crate::{EngineConfig, Error, GraphStore, RouteService};

/// Builds a network from everything the mirror holds.
///
/// Records that would break graph invariants (duplicate ids, bad
/// coordinates, edges to missing nodes, invalid weights) are skipped with a
/// warning so one corrupt record cannot keep the service from starting.
///
/// # Errors
///
/// Returns an error if the mirror itself cannot be read
pub async fn load_network(mirror: &dyn DurableMirror) -> Result<Network, Error> {
    let nodes = mirror.load_all_nodes().await?;
    let edges = mirror.load_all_edges().await?;

    let mut network = Network::new();
    let mut skipped = 0;
    for node in nodes {
        if let Err(err) = network.insert_node(node) {
            warn!("Skipping stored node: {err}");
            skipped += 1;
        }
    }
    for edge in edges {
        if let Err(err) = network.upsert_edge(edge) {
            warn!("Skipping stored edge: {err}");
            skipped += 1;
        }
    }

    info!(
        "Loaded {} nodes and {} edges from mirror ({skipped} skipped)",
        network.node_count(),
        network.edge_count()
    );
    Ok(network)
}

/// Loads the network from `mirror` and wires a route service that writes
/// every accepted mutation back to it.
///
/// Must be called inside a tokio runtime; the returned handle is the mirror
/// writer task, which finishes once the service is dropped.
///
/// # Errors
///
/// Returns an error if the mirror cannot be read
pub async fn create_route_service(
    mirror: Arc<dyn DurableMirror>,
    config: &EngineConfig,
) -> Result<(RouteService, JoinHandle<()>), Error> {
    let network = load_network(mirror.as_ref()).await?;
    let store = Arc::new(GraphStore::from_network(network));
    let (handle, writer) = spawn_mirror_writer(mirror);

    let service = RouteService::builder(store)
        .config(config)
        .mirror(handle)
        .build();
    info!("Route service ready");
    Ok((service, writer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::{InMemoryMirror, MirrorContents, sample_network};
    use crate::model::{Edge, Node, NodeUpdate};

    #[tokio::test]
    async fn corrupt_records_are_skipped() {
        let mut contents = sample_network();
        contents.nodes.push(Node::new("A", 0.0, 0.0));
        contents.edges.push(Edge::new("A", "Z", 1.0));
        let mirror = InMemoryMirror::with_contents(contents);

        let network = load_network(&mirror).await.unwrap();
        assert_eq!(network.node_count(), 5);
        assert_eq!(network.edge_count(), 6);
    }

    #[tokio::test]
    async fn service_mutations_reach_the_mirror() {
        let mirror = Arc::new(InMemoryMirror::with_contents(sample_network()));
        let (service, writer) = create_route_service(mirror.clone(), &EngineConfig::default())
            .await
            .unwrap();

        service.mark_node_unsafe("B").unwrap();
        service.create_node(Node::new("F", 6.93, 79.85)).unwrap();
        drop(service);
        writer.await.unwrap();

        let MirrorContents { nodes, .. } = mirror.contents();
        assert!(!nodes.iter().find(|n| n.id == "B").unwrap().is_safe);
        assert!(nodes.iter().any(|n| n.id == "F"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_mutations_leave_the_mirror_in_step() {
        let mirror = Arc::new(InMemoryMirror::with_contents(sample_network()));
        let (service, writer) = create_route_service(mirror.clone(), &EngineConfig::default())
            .await
            .unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..200 {
                    let update = NodeUpdate {
                        name: Some(format!("Point B #{round}")),
                        ..NodeUpdate::default()
                    };
                    service.update_node("B", &update).unwrap();
                }
            });
            scope.spawn(|| {
                for round in 0..200 {
                    service.safety().set_node_safety("B", round % 2 == 0).unwrap();
                    service.set_edge_blocked("B-D", round % 2 == 1).unwrap();
                }
            });
        });

        let in_memory = (service.store().node("B").unwrap(), service.store().edge("B-D").unwrap());
        drop(service);
        writer.await.unwrap();

        let MirrorContents { nodes, edges } = mirror.contents();
        assert_eq!(nodes.iter().find(|n| n.id == "B"), Some(&in_memory.0));
        assert_eq!(edges.iter().find(|e| e.id == "B-D"), Some(&in_memory.1));
        assert_eq!(in_memory.0.name, "Point B #199");
        assert!(!in_memory.0.is_safe);
        assert!(in_memory.1.blocked);
    }
}
