//! Dashboard Sync Monitor
//!
//! Keeps a live table of Kubernetes watcher states in sync with the
//! operations dashboard producer:
//! - fetches the resource catalog and initial stats over REST
//! - applies snapshot/delta/removed events from the websocket channel
//! - logs table changes and stats as they happen
//! - forwards `start`/`stop` commands typed on stdin

mod config;
mod controller;
mod error;
mod input;
mod render;

use anyhow::{Context, Result};
use config::MonitorConfig;
use controller::Monitor;
use dashboard_client::DashboardClient;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // wss:// needs a process-wide crypto provider; ignore if one is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Dashboard Sync Monitor");

    // Load configuration from environment variables
    let config = MonitorConfig::from_env().context("loading configuration")?;

    info!("Configuration:");
    info!("  Event channel: {}", config.ws_url);
    info!("  REST API: {}", config.api_url);
    info!(
        "  Reconnect: {} ({:?} to {:?})",
        if config.reconnect.enabled { "enabled" } else { "disabled" },
        config.reconnect.min_delay,
        config.reconnect.max_delay
    );
    info!("  Connect timeout: {:?}", config.connect_timeout);
    info!("  Command acknowledgement: {:?}", config.ack);

    let client = DashboardClient::new(config.api_url.clone(), config.http_timeout)
        .context("creating dashboard REST client")?;

    // Initialize and run monitor
    let monitor = Monitor::new(config, Arc::new(client));
    monitor.run().await?;

    Ok(())
}
