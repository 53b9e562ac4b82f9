use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Unknown edge: {0}")]
    UnknownEdge(String),
    #[error("Edge {edge} references missing node {node}")]
    InvalidReference { edge: String, node: String },
    #[error("Node already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("No shelter available near ({latitude}, {longitude})")]
    NoShelterAvailable { latitude: f64, longitude: f64 },
    #[error("Durable mirror unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("Notification delivery failed: {0}")]
    NotificationDeliveryFailed(String),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller (bad id, duplicate, bad payload)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownNode(_)
                | Error::UnknownEdge(_)
                | Error::InvalidReference { .. }
                | Error::AlreadyExists(_)
                | Error::InvalidData(_)
                | Error::NoShelterAvailable { .. }
        )
    }
}
