use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use haven_core::Error;
use serde_json::json;

/// Error returned by HTTP handlers.
///
/// Caller mistakes carry their message; anything else is logged and
/// answered with a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] Error),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) => match err {
                Error::UnknownNode(_) | Error::UnknownEdge(_) | Error::NoShelterAvailable { .. } => {
                    StatusCode::NOT_FOUND
                }
                Error::AlreadyExists(_) => StatusCode::CONFLICT,
                Error::InvalidReference { .. } | Error::InvalidData(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Startup failure of the server binary
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}
