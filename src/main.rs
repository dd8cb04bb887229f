//! # Task Rewards Server
//!
//! Standalone HTTP server for the task engine.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults plus TASK_REWARDS__* environment overrides
//! task-rewards-server
//!
//! # With a TOML file
//! task-rewards-server config/production.toml
//! TASK_REWARDS_CONFIG=config/production.toml TASK_REWARDS_ENV=production task-rewards-server
//! ```

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info};

use task_rewards::config::ConfigManager;
use task_rewards::engine::TaskEngine;
use task_rewards::logging;
use task_rewards::persistence::PgTaskStore;
use task_rewards::rate_limiter::{InMemoryRateLimitStore, RateLimiter};
use task_rewards::web::{create_router, AppState};

const CONFIG_PATH_ENV: &str = "TASK_REWARDS_CONFIG";
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("🚀 Starting Task Rewards Server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());
    let manager = ConfigManager::load(config_path.as_deref())
        .context("Failed to load configuration")?;
    let config = manager.config().clone();
    info!("   Environment: {}", manager.environment());

    let store = PgTaskStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;

    let windows = Arc::new(InMemoryRateLimitStore::new());
    let rate_limiter = RateLimiter::new(windows.clone(), config.rate_limits.clone());
    let longest_window = config
        .rate_limits
        .presets
        .values()
        .map(|preset| preset.window())
        .max()
        .unwrap_or(PRUNE_INTERVAL);
    let pruner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = windows.prune_idle(longest_window, Utc::now());
            if removed > 0 {
                debug!(removed, "Pruned idle rate limit windows");
            }
        }
    });

    let bind_address = config.web.bind_address.clone();
    let engine = TaskEngine::new(Arc::new(store), config).with_rate_limiter(rate_limiter);
    let app = create_router(AppState::new(engine));

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("🎉 Listening on {}", bind_address);
    info!("   Press Ctrl+C to shutdown gracefully");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pruner.abort();
    if let Err(e) = &served {
        error!("Server terminated with error: {}", e);
    }
    served.context("HTTP server failed")?;

    info!("👋 Task Rewards Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    info!("🛑 Shutdown signal received");
}
