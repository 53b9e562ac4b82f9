use std::time::Duration;

/// Tunables of the routing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a computed route stays in the cache
    pub cache_ttl: Duration,
    /// Events buffered per change feed subscriber before the oldest are lost
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60 * 60),
            event_capacity: 1024,
        }
    }
}
