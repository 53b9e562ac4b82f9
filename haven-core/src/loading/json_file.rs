use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;

use super::mirror::{DurableMirror, MirrorContents};
use crate::Error;
use crate::model::{Edge, Node};

/// Mirror stored as a single JSON document on disk.
///
/// Each write rewrites the whole file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new document.
#[derive(Debug)]
pub struct JsonFileMirror {
    path: PathBuf,
    contents: Mutex<MirrorContents>,
}

impl JsonFileMirror {
    /// Opens the document at `path`, starting empty if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let contents: MirrorContents = serde_json::from_slice(&bytes)?;
                info!(
                    "Opened mirror {} with {} nodes and {} edges",
                    path.display(),
                    contents.nodes.len(),
                    contents.edges.len()
                );
                contents
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("Mirror {} does not exist yet, starting empty", path.display());
                MirrorContents::default()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            contents: Mutex::new(contents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_with(&self, change: impl FnOnce(&mut MirrorContents)) -> Result<(), Error> {
        let document = {
            let mut contents = self.contents.lock();
            change(&mut contents);
            serde_json::to_vec_pretty(&*contents)?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &document)
            .await
            .map_err(|err| unavailable(&tmp, &err))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| unavailable(&self.path, &err))?;
        debug!("Wrote {} bytes to {}", document.len(), self.path.display());
        Ok(())
    }
}

fn unavailable(path: &Path, err: &std::io::Error) -> Error {
    Error::PersistenceUnavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl DurableMirror for JsonFileMirror {
    async fn load_all_nodes(&self) -> Result<Vec<Node>, Error> {
        Ok(self.contents.lock().nodes.clone())
    }

    async fn load_all_edges(&self) -> Result<Vec<Edge>, Error> {
        Ok(self.contents.lock().edges.clone())
    }

    async fn persist_node(&self, node: &Node) -> Result<(), Error> {
        self.write_with(|contents| contents.upsert_node(node)).await
    }

    async fn persist_edge(&self, edge: &Edge) -> Result<(), Error> {
        self.write_with(|contents| contents.upsert_edge(edge)).await
    }

    async fn remove_node(&self, id: &str) -> Result<(), Error> {
        self.write_with(|contents| contents.remove_node(id)).await
    }

    async fn remove_edge(&self, id: &str) -> Result<(), Error> {
        self.write_with(|contents| contents.remove_edge(id)).await
    }
}
