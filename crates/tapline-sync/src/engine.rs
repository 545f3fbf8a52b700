//! # Sync Engine
//!
//! Drains the durable offline buffer to the attendance API, strictly oldest
//! first, and converts submission outcomes into device status transitions.
//!
//! ## Drain Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         drain_once()                                    │
//! │                                                                         │
//! │   loop:                                                                 │
//! │     oldest buffered event ──none──► Empty / Synced(n)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │     transport.submit(event)                                             │
//! │           │                                                             │
//! │      ok ──┴── err                                                       │
//! │      │         │                                                        │
//! │      ▼         ▼                                                        │
//! │   remove     STOP: the failed event stays at the head, order intact     │
//! │   + next     ──► PartialFailure / TransportDown                         │
//! │                                                                         │
//! │   consecutive zero-progress cycles ≥ budget ──► status Error            │
//! │   any cycle with ≥1 delivery               ──► status Ready             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An event is removed from the buffer only AFTER the server acknowledged it;
//! a crash between submit and remove yields a duplicate submission, never a
//! lost event. The API deduplicates on `event_id`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::transport::EventTransport;
use tapline_core::{StatusEvent, StatusHandle};
use tapline_db::EventOutboxRepository;

// =============================================================================
// Sync Outcome
// =============================================================================

/// Result of one drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The buffer was already empty.
    Empty,

    /// Every buffered event was delivered.
    Synced(u32),

    /// Some events were delivered before a submission failed. The cycle
    /// stops on the first failure, so `failed` is always 1.
    PartialFailure { synced: u32, failed: u32 },

    /// The very first submission failed; nothing was delivered.
    TransportDown,
}

impl SyncOutcome {
    /// Number of events delivered this cycle.
    pub fn delivered(&self) -> u32 {
        match self {
            SyncOutcome::Empty | SyncOutcome::TransportDown => 0,
            SyncOutcome::Synced(n) => *n,
            SyncOutcome::PartialFailure { synced, .. } => *synced,
        }
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Owns the drain loop state: the failure streak and the status handle.
pub struct SyncEngine {
    outbox: EventOutboxRepository,
    transport: Arc<dyn EventTransport>,
    status: StatusHandle,

    /// Consecutive drain cycles that attempted a delivery and delivered
    /// nothing. Empty cycles leave it untouched.
    consecutive_failures: u32,

    /// Streak length at which the device status degrades to `Error`.
    max_retry_attempts: u32,
}

impl SyncEngine {
    pub fn new(
        outbox: EventOutboxRepository,
        transport: Arc<dyn EventTransport>,
        status: StatusHandle,
        max_retry_attempts: u32,
    ) -> Self {
        SyncEngine {
            outbox,
            transport,
            status,
            consecutive_failures: 0,
            max_retry_attempts: max_retry_attempts.max(1),
        }
    }

    /// Current zero-progress streak.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Runs one drain cycle: submit oldest-first until the buffer is empty or
    /// a submission fails. Database faults propagate; transport faults are
    /// folded into the returned outcome.
    pub async fn drain_once(&mut self) -> SyncResult<SyncOutcome> {
        let mut synced: u32 = 0;
        let mut failed = false;

        loop {
            let event = match self.outbox.oldest().await? {
                Some(event) => event,
                None => break,
            };

            match self.transport.submit(&event).await {
                Ok(()) => {
                    self.outbox.remove(&event.id).await?;
                    synced += 1;
                    debug!(event_id = %event.id, badge_id = %event.badge_id, "Event delivered");
                }
                Err(err) => {
                    warn!(
                        event_id = %event.id,
                        error = %err,
                        synced_this_cycle = synced,
                        "Submission failed, stopping cycle"
                    );
                    failed = true;
                    break;
                }
            }
        }

        let outcome = match (synced, failed) {
            (0, false) => SyncOutcome::Empty,
            (n, false) => SyncOutcome::Synced(n),
            (0, true) => SyncOutcome::TransportDown,
            (n, true) => SyncOutcome::PartialFailure {
                synced: n,
                failed: 1,
            },
        };

        self.track_outcome(outcome);
        Ok(outcome)
    }

    /// Updates the failure streak and the device status.
    ///
    /// Progress is delivery: a cycle that lands at least one event resets the
    /// streak even if it later hit a failure. An empty buffer is neither
    /// progress nor failure.
    fn track_outcome(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Empty => {}

            SyncOutcome::Synced(n) => {
                self.consecutive_failures = 0;
                info!(delivered = n, "Buffer fully drained");
                self.status.apply(StatusEvent::SyncSucceeded);
            }

            SyncOutcome::PartialFailure { synced, .. } => {
                self.consecutive_failures = 0;
                info!(delivered = synced, "Partial drain, head retained");
                self.status.apply(StatusEvent::SyncSucceeded);
            }

            SyncOutcome::TransportDown => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.max_retry_attempts {
                    warn!(
                        streak = self.consecutive_failures,
                        budget = self.max_retry_attempts,
                        "Retry budget exhausted"
                    );
                    self.status.apply(StatusEvent::SyncExhausted);
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
