//! PCVC Daemon - remote volume control server.
//!
//! Serves the host's mixer state to remote clients over TCP and applies the
//! updates they send. Without an audio backend it runs an in-memory mixer
//! seeded from a JSON file or a built-in demo state.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod signals;

use pcvc_core::{MemoryMixer, seed};
use pcvc_proto::ProtocolServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so it can set the default log level
    let config = config::load_config()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.daemon.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting PCVC daemon");

    let version = config.protocol_version();
    let state = match &config.mixer.seed_path {
        Some(path) => seed::load_seed(path, version).context("Failed to load seed state")?,
        None => {
            info!("No seed file configured, using demo mixer state");
            seed::demo_state(version)
        }
    };
    info!(
        device = %state.default_device.device_id,
        sessions = state.default_device.sessions.len(),
        "Mixer state ready"
    );
    let mixer = Arc::new(MemoryMixer::new(state));

    // Start protocol server
    let server = ProtocolServer::bind(config.server.listen.as_str(), config.server_config(), mixer)
        .await
        .context("Failed to start protocol server")?;
    let server_handle = tokio::spawn(async move {
        server.run().await;
    });

    info!("Daemon running. Press Ctrl+C to exit.");
    let signal = signals::shutdown_signal().await?;

    // Cleanup
    info!(signal, "Shutting down...");
    server_handle.abort();

    info!("PCVC daemon stopped");
    Ok(())
}
