//! webchat server entry point.
//!
//! Boots the HTTP server: chat, conversation history and the rate limiter in
//! front of them. Logs are JSON on stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use webchat_core::{AppConfig, CacheDb};

mod app;
mod completion;
mod error;
mod middleware;
mod routes;

const PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("load configuration")?;
    let db = Arc::new(
        CacheDb::open(&config.db_path)
            .await
            .with_context(|| format!("open store at {}", config.db_path.display()))?,
    );

    spawn_purge(db.clone(), config.rate_limit_window());

    let state = app::AppState::from_config(&config, db).context("build application state")?;
    let router = app::build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, render = config.render_enabled, "starting webchat server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve HTTP")?;

    tracing::info!("webchat server stopped");
    Ok(())
}

/// Periodically drop expired entries and rate-limit events outside the window.
fn spawn_purge(db: Arc<CacheDb>, window: Duration) {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match db.purge_expired().await {
                Ok(n) if n > 0 => tracing::debug!(purged = n, "expired entries removed"),
                Ok(_) => {}
                Err(e) => tracing::warn!("purge of expired entries failed: {e}"),
            }
            let cutoff = chrono::Utc::now().timestamp_millis().saturating_sub(window_ms);
            if let Err(e) = db.purge_rate_events_before(cutoff).await {
                tracing::warn!("purge of rate-limit events failed: {e}");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
