//! # Terminald
//!
//! Attendance terminal daemon: reads badge identifiers from stdin (one per
//! line, the contract of the reader bridge), runs them through the dedup and
//! buffering pipeline, and drains the buffer to the attendance API in the
//! background.
//!
//! ## Process Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Terminald                                     │
//! │                                                                         │
//! │  stdin lines ──► reader task ──► AgentHandle::tap                       │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                  TapAgent loop (dedup, buffer, drain, clock)            │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                  SQLite (WAL)  +  attendance API                        │
//! │                                                                         │
//! │  SIGINT ──► graceful shutdown: buffered events stay durable             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operator lines starting with `!` are commands (`!maintenance`, `!resume`);
//! everything else is treated as a badge identifier.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tapline_db::{Database, DbConfig};
use tapline_sync::{AgentHandle, HttpTransport, TapAgent, TerminalConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .init();

    info!("Starting attendance terminal...");

    let config_path = config_path();
    let config = TerminalConfig::load(&config_path)?;
    if !config_path.exists() {
        // First boot: persist the generated device id.
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Wrote initial config");
    }
    config.validate().context("configuration invalid")?;

    let db = Database::new(DbConfig::new(database_path(&config_path)))
        .await
        .context("database initialization failed")?;

    let pending = db.outbox().len().await?;
    if pending > 0 {
        info!(pending, "Buffered events recovered from previous run");
    }

    let transport = Arc::new(
        HttpTransport::new(&config.api, &config.device).context("transport setup failed")?,
    );

    let (agent, handle) = TapAgent::new(config, db.clone(), transport).await?;
    let agent_task = tokio::spawn(agent.run());

    let reader_task = tokio::spawn(read_badge_feed(handle.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
        _ = reader_task => {
            info!("Badge feed closed, shutting down");
        }
    }

    if let Err(err) = handle.shutdown().await {
        warn!(error = %err, "Agent already stopped");
    }
    agent_task.await.ok();
    db.close().await;

    info!("Terminal stopped");
    Ok(())
}

/// Config file location: `TAPLINE_CONFIG`, else the platform config dir,
/// else the working directory.
fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TAPLINE_CONFIG") {
        return PathBuf::from(path);
    }
    TerminalConfig::default_path().unwrap_or_else(|| PathBuf::from("terminal.toml"))
}

/// Database location: `TAPLINE_DB`, else `terminal.db` next to the config.
fn database_path(config_path: &std::path::Path) -> PathBuf {
    if let Ok(path) = std::env::var("TAPLINE_DB") {
        return PathBuf::from(path);
    }
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join("terminal.db"),
        _ => PathBuf::from("terminal.db"),
    }
}

/// Feeds stdin lines into the agent until EOF.
async fn read_badge_feed(handle: AgentHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let result = match input {
            "!maintenance" => handle.enter_maintenance().await,
            "!resume" => handle.exit_maintenance().await,
            badge => match handle.tap(badge).await {
                Ok(decision) => {
                    info!(
                        badge_id = %badge,
                        decision = ?decision,
                        status = %handle.status(),
                        "Tap processed"
                    );
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };

        if let Err(err) = result {
            warn!(input = %input, error = %err, "Input rejected");
        }
    }
}
