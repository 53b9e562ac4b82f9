use log::info;

use super::mirror::{DurableMirror, MirrorContents};
use crate::Error;
use crate::model::{Edge, Node, NodeCategory};

/// Five-node demonstration network with shelters on `D` and `E`
pub fn sample_network() -> MirrorContents {
    let nodes = [
        ("A", 6.9271, 79.8612, NodeCategory::Location),
        ("B", 6.9319, 79.8478, NodeCategory::Intersection),
        ("C", 6.9147, 79.8730, NodeCategory::Intersection),
        ("D", 6.9218, 79.8553, NodeCategory::Shelter),
        ("E", 6.9355, 79.8428, NodeCategory::Shelter),
    ]
    .into_iter()
    .map(|(id, lat, lon, category)| {
        Node::new(id, lat, lon)
            .with_name(format!("Point {id}"))
            .with_category(category)
    })
    .collect();

    let edges = [
        ("A", "B", 5.0),
        ("A", "C", 10.0),
        ("B", "D", 3.0),
        ("C", "D", 6.0),
        ("D", "E", 4.0),
        ("B", "E", 15.0),
    ]
    .into_iter()
    .map(|(s, t, w)| Edge::new(s, t, w))
    .collect();

    MirrorContents { nodes, edges }
}

/// Writes the sample network into `mirror` if it holds no nodes yet.
/// Returns whether anything was written.
///
/// # Errors
///
/// Propagates mirror failures
pub async fn seed_if_empty(mirror: &dyn DurableMirror) -> Result<bool, Error> {
    if !mirror.load_all_nodes().await?.is_empty() {
        return Ok(false);
    }
    let sample = sample_network();
    for node in &sample.nodes {
        mirror.persist_node(node).await?;
    }
    for edge in &sample.edges {
        mirror.persist_edge(edge).await?;
    }
    info!(
        "Seeded empty mirror with {} sample nodes and {} edges",
        sample.nodes.len(),
        sample.edges.len()
    );
    Ok(true)
}
