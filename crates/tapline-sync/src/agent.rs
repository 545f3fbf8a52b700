//! # Terminal Agent
//!
//! The long-running orchestrator: owns the deduplicator, the sync engine, the
//! clock, and the status machine, and serializes all access to them through a
//! single command loop.
//!
//! ## Event Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          TapAgent::run                                  │
//! │                                                                         │
//! │   startup: clock sync (ordered servers) ──► status Init → Ready         │
//! │            seed dedup from persisted tap history                        │
//! │                                                                         │
//! │   select! {                                                             │
//! │       command channel ──► Tap / Maintenance / Network / Shutdown        │
//! │       drain tick      ──► engine.drain_once()                           │
//! │       resync tick     ──► clock re-resolution                           │
//! │   }                                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One loop, one owner: taps, drains, and resyncs never interleave, so the
//! dedup history and the buffer are always observed in a consistent order.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::clock::{ClockSyncService, SharedClock};
use crate::config::TerminalConfig;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::transport::EventTransport;
use tapline_core::{
    validate_badge_id, AttendanceEvent, StatusEvent, StatusHandle, TapDecision, TapDeduplicator,
};
use tapline_db::Database;

// =============================================================================
// Commands
// =============================================================================

/// Commands accepted by the agent loop.
enum AgentCommand {
    /// A badge was presented to the reader.
    Tap {
        badge_id: String,
        reply: oneshot::Sender<SyncResult<TapDecision>>,
    },

    /// Operator commands. Acknowledged once the transition is applied.
    EnterMaintenance { reply: oneshot::Sender<()> },
    ExitMaintenance { reply: oneshot::Sender<()> },

    /// Connectivity watcher reports. Acknowledged once applied.
    NetworkLost { reply: oneshot::Sender<()> },
    NetworkRestored { reply: oneshot::Sender<()> },

    /// Graceful stop.
    Shutdown,
}

// =============================================================================
// Agent Handle
// =============================================================================

/// Cloneable handle for feeding the agent from readers, watchers, and the
/// operator console.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentCommand>,
    status: StatusHandle,
}

impl AgentHandle {
    /// Submits a tap and waits for the accept/suppress decision.
    pub async fn tap(&self, badge_id: &str) -> SyncResult<TapDecision> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(AgentCommand::Tap {
                badge_id: badge_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| SyncError::ChannelError("agent stopped".into()))?;

        rx.await
            .map_err(|_| SyncError::ChannelError("agent dropped reply".into()))?
    }

    pub async fn enter_maintenance(&self) -> SyncResult<()> {
        self.send_acked(|reply| AgentCommand::EnterMaintenance { reply })
            .await
    }

    pub async fn exit_maintenance(&self) -> SyncResult<()> {
        self.send_acked(|reply| AgentCommand::ExitMaintenance { reply })
            .await
    }

    pub async fn network_lost(&self) -> SyncResult<()> {
        self.send_acked(|reply| AgentCommand::NetworkLost { reply })
            .await
    }

    pub async fn network_restored(&self) -> SyncResult<()> {
        self.send_acked(|reply| AgentCommand::NetworkRestored { reply })
            .await
    }

    /// Requests a graceful stop; pending buffered events stay durable.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(AgentCommand::Shutdown).await
    }

    /// Current device status (lock-free of the agent loop).
    pub fn status(&self) -> tapline_core::DeviceStatus {
        self.status.current()
    }

    async fn send(&self, command: AgentCommand) -> SyncResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelError("agent stopped".into()))
    }

    async fn send_acked(
        &self,
        build: impl FnOnce(oneshot::Sender<()>) -> AgentCommand,
    ) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| SyncError::ChannelError("agent dropped reply".into()))
    }
}

// =============================================================================
// Tap Agent
// =============================================================================

/// The terminal's single event loop.
pub struct TapAgent {
    config: TerminalConfig,
    db: Database,
    clock: SharedClock,
    clock_sync: ClockSyncService,
    dedup: TapDeduplicator,
    engine: SyncEngine,
    status: StatusHandle,
    rx: mpsc::Receiver<AgentCommand>,
}

impl TapAgent {
    /// Builds the agent and its handle. Seeds the deduplicator from the
    /// persisted tap history so a power cycle does not reopen suppression
    /// windows.
    pub async fn new(
        config: TerminalConfig,
        db: Database,
        transport: Arc<dyn EventTransport>,
    ) -> SyncResult<(TapAgent, AgentHandle)> {
        let status = StatusHandle::new();
        let clock = SharedClock::new();
        let clock_sync = ClockSyncService::new(&config.clock);

        let seeded = db
            .tap_history()
            .load(config.buffer.max_tap_history)
            .await?;
        if !seeded.is_empty() {
            info!(entries = seeded.len(), "Tap history restored");
        }
        let dedup = TapDeduplicator::with_entries(
            config.buffer.max_tap_history as usize,
            config.buffer.min_tap_interval(),
            seeded,
        );

        let engine = SyncEngine::new(
            db.outbox(),
            transport,
            status.clone(),
            config.sync.max_retry_attempts,
        );

        let (tx, rx) = mpsc::channel(64);
        let handle = AgentHandle {
            tx,
            status: status.clone(),
        };

        let agent = TapAgent {
            config,
            db,
            clock,
            clock_sync,
            dedup,
            engine,
            status,
            rx,
        };

        Ok((agent, handle))
    }

    /// Runs until shutdown. Consumes the agent.
    pub async fn run(mut self) {
        self.sync_clock().await;

        let mut drain = tokio::time::interval(self.config.drain_interval());
        drain.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut resync = tokio::time::interval(self.config.clock_resync_interval());
        resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        resync.tick().await; // the startup sync already happened

        info!(device = %self.config.device.name, "Agent started");

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        None => break, // all handles dropped
                    }
                }

                _ = drain.tick() => {
                    match self.engine.drain_once().await {
                        Ok(outcome) => {
                            if outcome.delivered() > 0 {
                                info!(delivered = outcome.delivered(), "Drain cycle complete");
                            }
                        }
                        Err(err) => error!(error = %err, "Drain cycle failed"),
                    }
                }

                _ = resync.tick() => {
                    self.sync_clock().await;
                }
            }
        }

        info!("Agent stopped");
    }

    /// Returns true when the loop should exit.
    async fn handle_command(&mut self, command: AgentCommand) -> bool {
        match command {
            AgentCommand::Tap { badge_id, reply } => {
                let decision = self.handle_tap(&badge_id).await;
                // The caller may have given up waiting; that is fine.
                let _ = reply.send(decision);
                false
            }

            AgentCommand::EnterMaintenance { reply } => {
                self.status.apply(StatusEvent::EnterMaintenance);
                info!("Entered maintenance");
                let _ = reply.send(());
                false
            }

            AgentCommand::ExitMaintenance { reply } => {
                self.status.apply(StatusEvent::ExitMaintenance);
                info!("Left maintenance, resyncing clock");
                self.sync_clock().await;
                let _ = reply.send(());
                false
            }

            AgentCommand::NetworkLost { reply } => {
                self.status.apply(StatusEvent::NetworkLost);
                warn!("Network lost, buffering locally");
                let _ = reply.send(());
                false
            }

            AgentCommand::NetworkRestored { reply } => {
                self.status.apply(StatusEvent::NetworkRestored);
                info!("Network restored");
                if !self.clock.is_synced() {
                    self.sync_clock().await;
                }
                let _ = reply.send(());
                false
            }

            AgentCommand::Shutdown => true,
        }
    }

    /// Full tap path: validate, dedup check, durably buffer, then commit the
    /// suppression window. The window opens only after the event is safely in
    /// the buffer; a storage fault leaves the dedup history untouched so the
    /// next re-tap gets another chance.
    async fn handle_tap(&mut self, badge_id: &str) -> SyncResult<TapDecision> {
        validate_badge_id(badge_id)?;

        self.status.apply(StatusEvent::TapStarted);
        let now = self.clock.now();
        let decision = self.dedup.check(badge_id, now);

        let result = if decision.is_accept() {
            match self.buffer_accepted(badge_id, now).await {
                Ok(()) => {
                    self.dedup.record(badge_id, now);
                    Ok(decision)
                }
                Err(err) => Err(err),
            }
        } else {
            info!(badge_id = %badge_id, "Tap suppressed (repeat within interval)");
            Ok(decision)
        };

        self.status.apply(StatusEvent::TapFinished);
        result
    }

    async fn buffer_accepted(
        &mut self,
        badge_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> SyncResult<()> {
        let event = AttendanceEvent::new(badge_id, now, self.config.clock.utc_offset_minutes);

        let evicted = self
            .db
            .outbox()
            .enqueue(&event, self.config.buffer.max_offline_records)
            .await?;
        if evicted > 0 {
            warn!(evicted, "Offline buffer full, oldest events dropped");
        }

        self.db.tap_history().record(badge_id, now).await?;
        self.db
            .tap_history()
            .prune(self.config.buffer.max_tap_history)
            .await?;

        info!(
            badge_id = %badge_id,
            event_id = %event.id,
            local_time = %event.local_time,
            "Tap accepted"
        );
        Ok(())
    }

    /// Resolves wall-clock time; on success marks the shared clock and feeds
    /// the status machine. Failure leaves the terminal running degraded.
    async fn sync_clock(&mut self) {
        match self.clock_sync.resolve_time().await {
            Ok(now) => {
                self.clock.mark_synced(now);
                self.status.apply(StatusEvent::ClockSynced);
            }
            Err(err) => {
                warn!(error = %err, "Clock sync failed, continuing unsynced");
                self.status.apply(StatusEvent::ClockSyncFailed);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tapline_core::DeviceStatus;
    use tapline_db::DbConfig;

    struct RecordingTransport {
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventTransport for RecordingTransport {
        async fn submit(&self, event: &AttendanceEvent) -> Result<(), TransportError> {
            self.submitted.lock().unwrap().push(event.badge_id.clone());
            Ok(())
        }
    }

    fn test_config() -> TerminalConfig {
        let mut config = TerminalConfig::default();
        config.api.base_url = "https://attendance.example.org/api".into();
        // Unroutable clock servers with a tiny budget keep startup fast;
        // the agent runs unsynced on the host clock.
        config.clock.ntp_servers = vec!["127.0.0.1".into()];
        config.clock.ntp_timeout_ms = 50;
        config.clock.max_retries = 1;
        config.sync.drain_interval_secs = 3600;
        config.sync.clock_resync_interval_secs = 3600;
        config
    }

    async fn spawn_agent() -> (AgentHandle, Database, tokio::task::JoinHandle<()>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let transport = Arc::new(RecordingTransport {
            submitted: Mutex::new(Vec::new()),
        });
        let (agent, handle) = TapAgent::new(test_config(), db.clone(), transport)
            .await
            .unwrap();
        let task = tokio::spawn(agent.run());
        (handle, db, task)
    }

    #[tokio::test]
    async fn test_tap_accept_then_suppress() {
        let (handle, db, task) = spawn_agent().await;

        assert_eq!(handle.tap("04A1B2C3").await.unwrap(), TapDecision::Accept);
        assert_eq!(handle.tap("04A1B2C3").await.unwrap(), TapDecision::Suppress);

        // Only the accepted tap reached the buffer.
        assert_eq!(db.outbox().len().await.unwrap(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_badge_rejected_without_buffering() {
        let (handle, db, task) = spawn_agent().await;

        assert!(handle.tap("").await.is_err());
        assert!(handle.tap("bad badge!").await.is_err());
        assert_eq!(db.outbox().len().await.unwrap(), 0);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_accepted_tap_persists_history() {
        let (handle, db, task) = spawn_agent().await;

        handle.tap("BADGE-1").await.unwrap();

        let history = db.tap_history().load(50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].badge_id, "BADGE-1");

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_fault_does_not_burn_dedup_window() {
        let (handle, db, task) = spawn_agent().await;

        // Hide the outbox table so the durable enqueue fails.
        sqlx::query("ALTER TABLE event_outbox RENAME TO event_outbox_gone")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(handle.tap("BADGE-7").await.is_err());

        // Storage recovers; the earlier failed accept must not have opened
        // the suppression window, so the re-tap is captured.
        sqlx::query("ALTER TABLE event_outbox_gone RENAME TO event_outbox")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(handle.tap("BADGE-7").await.unwrap(), TapDecision::Accept);
        assert_eq!(db.outbox().len().await.unwrap(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_maintenance_round_trip() {
        let (handle, _db, task) = spawn_agent().await;

        handle.enter_maintenance().await.unwrap();
        assert_eq!(handle.status(), DeviceStatus::Maintenance);

        handle.exit_maintenance().await.unwrap();
        assert_eq!(handle.status(), DeviceStatus::Init);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_network_loss_flags_offline_but_taps_still_buffer() {
        let (handle, db, task) = spawn_agent().await;

        handle.network_lost().await.unwrap();
        assert_eq!(handle.status(), DeviceStatus::Offline);

        // Capture is never gated on connectivity.
        assert_eq!(handle.tap("BADGE-9").await.unwrap(), TapDecision::Accept);
        assert_eq!(db.outbox().len().await.unwrap(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
