use std::sync::Arc;
use std::time::Duration;

use xtream_cache::{
    arguments,
    cache::CacheStore,
    config::Config,
    logger::{self, LogTag},
    webserver,
    webserver::state::AppState,
};

const SECS_PER_DAY: u64 = 86_400;

/// Main entry point for xtream-cache
///
/// Startup order matters: logger first, then config, then the store
/// (with a housekeeping sweep), then the webserver which blocks until
/// shutdown.
#[tokio::main]
async fn main() {
    logger::init();

    if arguments::is_help_requested() {
        arguments::print_help();
        std::process::exit(0);
    }

    logger::info(LogTag::System, "🚀 xtream-cache starting up...");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            logger::error(LogTag::Config, &format!("❌ Failed to load config: {}", e));
            std::process::exit(1);
        }
    };
    logger::debug(
        LogTag::Config,
        &format!(
            "Config loaded (db={}, freshness_window={}s)",
            config.database_path, config.freshness_window_secs
        ),
    );

    let store = match CacheStore::open(
        &config.database_path,
        Duration::from_secs(config.freshness_window_secs),
    ) {
        Ok(store) => store,
        Err(e) => {
            logger::error(
                LogTag::Cache,
                &format!("❌ Failed to open cache database: {}", e),
            );
            std::process::exit(1);
        }
    };

    // Housekeeping sweep on boot; a failure here is not fatal
    let max_age = Duration::from_secs(config.sweep_max_age_days.max(0) as u64 * SECS_PER_DAY);
    match store.sweep_expired(max_age) {
        Ok(0) => {}
        Ok(deleted) => logger::info(
            LogTag::Cache,
            &format!("🧹 Startup sweep removed {} aged cache entries", deleted),
        ),
        Err(e) => logger::warning(LogTag::Cache, &format!("Startup sweep failed: {}", e)),
    }

    let state = match AppState::new(config, store) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            logger::error(
                LogTag::System,
                &format!("❌ Failed to initialize application state: {}", e),
            );
            std::process::exit(1);
        }
    };

    // Ctrl-C triggers graceful webserver shutdown
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::info(LogTag::System, "Received Ctrl-C, shutting down...");
            webserver::shutdown();
        }
    });

    match webserver::start_server(state).await {
        Ok(()) => logger::info(LogTag::System, "✅ xtream-cache stopped"),
        Err(e) => {
            logger::error(LogTag::System, &format!("❌ Webserver failed: {}", e));
            std::process::exit(1);
        }
    }
}
