use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Error;
use crate::model::{Edge, EdgeId, Node, NodeId};

/// Durable copy of the road network.
///
/// The in-memory store is authoritative while the process runs; the mirror
/// is read once at startup and written to after every accepted mutation.
#[async_trait]
pub trait DurableMirror: Send + Sync {
    async fn load_all_nodes(&self) -> Result<Vec<Node>, Error>;
    async fn load_all_edges(&self) -> Result<Vec<Edge>, Error>;
    async fn persist_node(&self, node: &Node) -> Result<(), Error>;
    async fn persist_edge(&self, edge: &Edge) -> Result<(), Error>;
    async fn remove_node(&self, id: &str) -> Result<(), Error>;
    async fn remove_edge(&self, id: &str) -> Result<(), Error>;
}

/// Plain node and edge lists, the shape every mirror stores
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorContents {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl MirrorContents {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub(crate) fn upsert_node(&mut self, node: &Node) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node.clone(),
            None => self.nodes.push(node.clone()),
        }
    }

    pub(crate) fn upsert_edge(&mut self, edge: &Edge) {
        match self.edges.iter_mut().find(|e| e.id == edge.id) {
            Some(existing) => *existing = edge.clone(),
            None => self.edges.push(edge.clone()),
        }
    }

    pub(crate) fn remove_node(&mut self, id: &str) {
        self.nodes.retain(|n| n.id != id);
        self.edges.retain(|e| !e.touches(id));
    }

    pub(crate) fn remove_edge(&mut self, id: &str) {
        self.edges.retain(|e| e.id != id);
    }
}

/// Mirror kept in process memory, used when no durable storage is configured
#[derive(Debug, Default)]
pub struct InMemoryMirror {
    contents: Mutex<MirrorContents>,
    unavailable: AtomicBool,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: MirrorContents) -> Self {
        Self {
            contents: Mutex::new(contents),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn contents(&self) -> MirrorContents {
        self.contents.lock().clone()
    }

    /// Makes every subsequent call fail with [`Error::PersistenceUnavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::PersistenceUnavailable(
                "in-memory mirror switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableMirror for InMemoryMirror {
    async fn load_all_nodes(&self) -> Result<Vec<Node>, Error> {
        self.check()?;
        Ok(self.contents.lock().nodes.clone())
    }

    async fn load_all_edges(&self) -> Result<Vec<Edge>, Error> {
        self.check()?;
        Ok(self.contents.lock().edges.clone())
    }

    async fn persist_node(&self, node: &Node) -> Result<(), Error> {
        self.check()?;
        self.contents.lock().upsert_node(node);
        Ok(())
    }

    async fn persist_edge(&self, edge: &Edge) -> Result<(), Error> {
        self.check()?;
        self.contents.lock().upsert_edge(edge);
        Ok(())
    }

    async fn remove_node(&self, id: &str) -> Result<(), Error> {
        self.check()?;
        self.contents.lock().remove_node(id);
        Ok(())
    }

    async fn remove_edge(&self, id: &str) -> Result<(), Error> {
        self.check()?;
        self.contents.lock().remove_edge(id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorWrite {
    Node(Node),
    Edge(Edge),
    RemoveNode(NodeId),
    RemoveEdge(EdgeId),
}

/// Queue in front of the mirror writer task.
///
/// Sending never blocks the caller; a disabled handle drops every write.
#[derive(Debug, Clone, Default)]
pub struct MirrorHandle {
    tx: Option<mpsc::UnboundedSender<MirrorWrite>>,
}

impl MirrorHandle {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn send(&self, write: MirrorWrite) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(mpsc::error::SendError(write)) = tx.send(write) {
            let err = Error::PersistenceUnavailable("mirror writer has stopped".to_string());
            warn!("{err}, dropping {write:?}");
        }
    }
}

/// Starts the task that applies queued writes to `mirror` in order.
///
/// The task ends once every [`MirrorHandle`] clone has been dropped.
pub fn spawn_mirror_writer(mirror: Arc<dyn DurableMirror>) -> (MirrorHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<MirrorWrite>();
    let task = tokio::spawn(async move {
        while let Some(write) = rx.recv().await {
            if let Err(err) = apply(mirror.as_ref(), &write).await {
                warn!("Mirror write {write:?} failed: {err}");
            }
        }
        debug!("Mirror writer stopped");
    });
    (MirrorHandle { tx: Some(tx) }, task)
}

async fn apply(mirror: &dyn DurableMirror, write: &MirrorWrite) -> Result<(), Error> {
    match write {
        MirrorWrite::Node(node) => mirror.persist_node(node).await,
        MirrorWrite::Edge(edge) => mirror.persist_edge(edge).await,
        MirrorWrite::RemoveNode(id) => mirror.remove_node(id).await,
        MirrorWrite::RemoveEdge(id) => mirror.remove_edge(id).await,
    }
}
