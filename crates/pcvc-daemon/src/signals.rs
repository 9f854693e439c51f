//! Signal handling for graceful shutdown.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};

/// Wait until SIGTERM or SIGINT (Ctrl+C) arrives.
///
/// Returns the name of the signal received.
pub async fn shutdown_signal() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let name = tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            "SIGINT"
        }
    };

    Ok(name)
}
