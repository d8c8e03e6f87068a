/// Service configuration
///
/// Loaded from a JSON file at startup (default `config.json`); a missing
/// file falls back to defaults so the service runs out of the box.
/// Individual fields can be overridden with command-line flags.
use serde::Deserialize;

use crate::arguments;

/// Default freshness window for cached buckets (5 minutes)
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 300;

/// Default age past which the housekeeping sweep deletes entries (30 days)
pub const DEFAULT_SWEEP_MAX_AGE_DAYS: i64 = 30;

/// Timeout for upstream endpoint probes
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Timeout for the raw proxy path (large playlist bodies take longer)
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub freshness_window_secs: u64,
    pub probe_timeout_secs: u64,
    pub proxy_timeout_secs: u64,
    pub sweep_max_age_days: i64,
    /// Bearer token required for the administrative endpoints.
    /// When unset, the admin gate is disabled.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "xtream_cache.db".to_string(),
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            proxy_timeout_secs: DEFAULT_PROXY_TIMEOUT_SECS,
            sweep_max_age_days: DEFAULT_SWEEP_MAX_AGE_DAYS,
            admin_token: None,
        }
    }
}

impl Config {
    /// Load configuration from disk, then apply command-line overrides
    pub fn load() -> Result<Self, String> {
        let path = arguments::get_arg_value("--config").unwrap_or_else(|| "config.json".to_string());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<Config>(&raw)
                .map_err(|e| format!("Failed to parse {}: {}", path, e))?,
            Err(_) => Config::default(),
        };

        if let Some(host) = arguments::get_arg_value("--host") {
            config.host = host;
        }
        if let Some(port) = arguments::get_arg_value("--port") {
            config.port = port
                .parse()
                .map_err(|e| format!("Invalid --port value '{}': {}", port, e))?;
        }
        if let Some(db_path) = arguments::get_arg_value("--db-path") {
            config.database_path = db_path;
        }

        if config.freshness_window_secs == 0 {
            return Err("freshness_window_secs must be greater than zero".to_string());
        }

        Ok(config)
    }
}
