//! Signal handling for the long-running `run` command.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

/// Wait for SIGTERM or SIGINT
pub async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            result = signal::ctrl_c() => {
                result.context("Failed to install SIGINT handler")?;
                info!("Received SIGINT signal (Ctrl+C)");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
