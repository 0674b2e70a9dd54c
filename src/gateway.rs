//! Daemon for autopurge
//!
//! Wires the Telegram channel, the expiration index and the sweep scheduler
//! together, then runs until SIGTERM/SIGINT.

use crate::channels::{Channel, TelegramChannel};
use crate::config::Config;
use crate::index::ExpirationIndex;
use crate::ingest::Ingestor;
use crate::store::{MessageStore, TelegramStore};
use crate::sweep::SweepScheduler;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Time each background task gets to finish during shutdown
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Runs the retention daemon with graceful shutdown.
///
/// This function:
/// 1. Builds the expiration index, retention policy and message store
/// 2. Starts the sweep and reaper tasks
/// 3. Starts the Telegram dispatcher feeding new messages into the index
/// 4. Announces itself in the monitored chat (unless disabled)
/// 5. Waits for SIGTERM/SIGINT and stops everything in order
pub async fn run_gateway(config: &Config, pid_file: Option<PathBuf>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting autopurge daemon"
    );

    let policy = config.retention_policy()?;
    let sweep_config = config.sweep_config()?;
    let token = config.telegram_token.clone().context(
        "No Telegram token configured. Set BOT_TOKEN or add telegram_token to config.json",
    )?;

    let channel = TelegramChannel::new(token, sweep_config.channel_id)
        .context("Failed to create Telegram channel")?;

    let index = ExpirationIndex::new();
    let ingestor = Ingestor::new(index.clone(), policy);
    let store: Arc<dyn MessageStore> = Arc::new(TelegramStore::new(channel.bot()));
    let scheduler = Arc::new(SweepScheduler::new(index.clone(), store, sweep_config));

    if let Some(ref path) = pid_file {
        write_pid_file(path)?;
    }

    let scheduler_handle = Arc::clone(&scheduler).start();

    channel
        .start(ingestor.clone())
        .await
        .context("Failed to start Telegram channel")?;

    info!(
        retention = %policy.short_label(),
        fast_mode = policy.fast_mode(),
        "Retention policy active"
    );

    if config.announce {
        if let Err(e) = channel.announce(&ingestor).await {
            error!("Failed to announce bot activation: {}", e);
        }
        if let Err(e) = channel.set_status(&policy).await {
            warn!("Failed to set bot status: {}", e);
        }
    }

    info!("Daemon is running. Press Ctrl+C to stop.");

    wait_for_shutdown_signal().await?;

    info!("Starting graceful shutdown sequence...");

    if let Err(e) = channel.shutdown().await {
        error!("Error shutting down Telegram channel: {}", e);
    }

    scheduler_handle
        .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;

    let remaining = index.len().await;
    if remaining > 0 {
        warn!(
            remaining = remaining,
            "Tracked messages are held in memory only and will not be deleted after restart"
        );
    }

    if let Some(ref path) = pid_file {
        remove_pid_file(path);
    }

    info!("Daemon stopped gracefully");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to set up SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Received Ctrl+C, initiating graceful shutdown...");
    }
    Ok(())
}

fn write_pid_file(path: &Path) -> Result<()> {
    std::fs::write(path, std::process::id().to_string())
        .with_context(|| format!("Failed to write PID file: {:?}", path))?;
    info!(pid_file = %path.display(), "PID file written");
    Ok(())
}

fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(pid_file = %path.display(), "Failed to remove PID file: {}", e);
    }
}
