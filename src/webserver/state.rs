/// Shared application state for the webserver
///
/// Holds the cache store, the fetch orchestrator and the raw proxy
/// client so route handlers can reach them through one `Arc`.
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::upstream::proxy::ProxyClient;
use crate::upstream::FetchOrchestrator;

/// Shared application state passed to all route handlers
pub struct AppState {
    pub config: Arc<Config>,
    pub store: CacheStore,
    pub orchestrator: FetchOrchestrator,
    pub proxy: ProxyClient,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, store: CacheStore) -> Result<Self, String> {
        let orchestrator = FetchOrchestrator::new(store.clone(), config.probe_timeout_secs)?;
        let proxy = ProxyClient::new(config.proxy_timeout_secs)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            orchestrator,
            proxy,
            startup_time: chrono::Utc::now(),
        })
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.startup_time)
            .num_seconds()
            .max(0) as u64
    }
}
