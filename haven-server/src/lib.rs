//! HTTP surface of the evacuation routing engine.

pub mod api;
pub mod config;
pub mod error;

pub use api::{AppState, router};
pub use config::{Cli, ServerConfig};
pub use error::{ApiError, ConfigError};
