use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use haven_core::EngineConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Server settings, read from a TOML file and overridden by CLI flags
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub cache_ttl_secs: u64,
    /// Zero disables the periodic sweep
    pub sweep_interval_secs: u64,
    pub event_capacity: usize,
    pub request_timeout_secs: u64,
    pub concurrency_limit: usize,
    /// JSON document mirroring the network; in-memory only when unset
    pub mirror_path: Option<PathBuf>,
    /// Load the sample network when the mirror is empty
    pub seed_sample: bool,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cache_ttl_secs: 60 * 60,
            sweep_interval_secs: 5 * 60,
            event_capacity: 1024,
            request_timeout_secs: 30,
            concurrency_limit: 256,
            mirror_path: None,
            seed_sample: false,
            log_filter: "info,haven_core=info,tower_http=info".to_string(),
        }
    }
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            event_capacity: self.event_capacity,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[derive(Debug, Parser)]
#[command(name = "haven-server", version, about = "Safe evacuation routing server")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// JSON file mirroring the road network
    #[arg(long)]
    pub mirror: Option<PathBuf>,

    /// Seed an empty mirror with the sample network
    #[arg(long)]
    pub seed_sample: bool,

    /// Cached route lifetime in seconds
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Log filter directives, e.g. `debug,tower_http=info`
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Cli {
    /// File settings (or defaults) with the flags given on the command line
    /// applied on top
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded
    pub fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(path) = &self.mirror {
            config.mirror_path = Some(path.clone());
        }
        if self.seed_sample {
            config.seed_sample = true;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.cache_ttl_secs = ttl;
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter.clone_from(filter);
        }
        Ok(config)
    }
}
