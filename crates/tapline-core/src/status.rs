//! # Device Status Machine
//!
//! Aggregates clock-sync and sync-engine outcomes into the one authoritative
//! [`DeviceStatus`] value.
//!
//! ## Transition Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Status Transitions                                │
//! │                                                                         │
//! │  Init ──ClockSynced──────────────► Ready                                │
//! │  Ready ◄──TapStarted/TapFinished──► Processing                          │
//! │  Ready/Processing ──SyncExhausted─► Error                               │
//! │  Error ──SyncSucceeded───────────► Ready                                │
//! │  any (except Maintenance) ──NetworkLost──► Offline                      │
//! │  Offline ──NetworkRestored───────► Ready (Init if clock never synced)   │
//! │  any ──EnterMaintenance──────────► Maintenance                          │
//! │  Maintenance ──ExitMaintenance───► Init                                 │
//! │                                                                         │
//! │  No terminal state: the terminal runs indefinitely.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While `Error` or `Offline` holds, taps keep buffering; the status is a
//! user-visible flag, never a gate on capture.

use std::sync::{Arc, Mutex};

use crate::types::DeviceStatus;

// =============================================================================
// Status Events
// =============================================================================

/// Inputs that drive status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// The clock sync service resolved wall-clock time.
    ClockSynced,

    /// Every configured time server was unreachable. Leaves the state
    /// unchanged: an unsynced terminal simply never leaves `Init`, and a
    /// synced one keeps running on the extrapolated clock.
    ClockSyncFailed,

    /// A tap is being handled.
    TapStarted,

    /// Tap handling finished.
    TapFinished,

    /// The sync engine confirmed a successful submission.
    SyncSucceeded,

    /// The sync engine exhausted its consecutive-failure budget.
    SyncExhausted,

    /// No network path is available.
    NetworkLost,

    /// A network path came back.
    NetworkRestored,

    /// External operator command: enter maintenance.
    EnterMaintenance,

    /// External operator command: resume from maintenance.
    ExitMaintenance,
}

// =============================================================================
// Status Machine
// =============================================================================

/// The device status machine. Exactly one [`DeviceStatus`] holds at any
/// instant; [`StatusMachine::apply`] is the only way to change it.
#[derive(Debug)]
pub struct StatusMachine {
    current: DeviceStatus,

    /// Whether the clock has ever synced. Gates `Init → Ready` and decides
    /// where `NetworkRestored` lands.
    clock_synced: bool,
}

impl StatusMachine {
    /// Creates a machine in the boot state.
    pub fn new() -> Self {
        StatusMachine {
            current: DeviceStatus::Init,
            clock_synced: false,
        }
    }

    /// Returns the current status.
    pub fn current(&self) -> DeviceStatus {
        self.current
    }

    /// Applies an event and returns the (possibly unchanged) status.
    ///
    /// Unlisted event/state combinations are no-ops: the machine never
    /// panics on an out-of-order event, it just holds its state.
    pub fn apply(&mut self, event: StatusEvent) -> DeviceStatus {
        use DeviceStatus::*;
        use StatusEvent::*;

        let next = match (self.current, event) {
            (Init, ClockSynced) => Ready,

            (current, ClockSyncFailed) => current,

            (Ready, TapStarted) => Processing,
            (Processing, TapFinished) => Ready,

            (Error, SyncSucceeded) => Ready,

            (Ready | Processing, SyncExhausted) => Error,

            (Maintenance, NetworkLost) => Maintenance,
            (_, NetworkLost) => Offline,

            (Offline, NetworkRestored) => {
                if self.clock_synced {
                    Ready
                } else {
                    Init
                }
            }

            (_, EnterMaintenance) => Maintenance,
            (Maintenance, ExitMaintenance) => Init,

            (current, _) => current,
        };

        if event == ClockSynced {
            self.clock_synced = true;
        }

        self.current = next;
        next
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        StatusMachine::new()
    }
}

// =============================================================================
// Shared Handle
// =============================================================================

/// Cloneable handle sharing one [`StatusMachine`] between the agent loop and
/// the sync engine.
///
/// The firmware this replaces kept status in an ambient global; here the
/// shared state is explicit and mutex-protected. Lock scope is a single
/// transition, so contention is negligible.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<Mutex<StatusMachine>>,
}

impl StatusHandle {
    /// Creates a handle around a fresh machine in `Init`.
    pub fn new() -> Self {
        StatusHandle {
            inner: Arc::new(Mutex::new(StatusMachine::new())),
        }
    }

    /// Applies an event, returning the resulting status.
    pub fn apply(&self, event: StatusEvent) -> DeviceStatus {
        match self.inner.lock() {
            Ok(mut machine) => machine.apply(event),
            // A poisoned lock means a panic elsewhere; report the last
            // coherent state rather than propagating the poison.
            Err(poisoned) => poisoned.into_inner().apply(event),
        }
    }

    /// Returns the current status.
    pub fn current(&self) -> DeviceStatus {
        match self.inner.lock() {
            Ok(machine) => machine.current(),
            Err(poisoned) => poisoned.into_inner().current(),
        }
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        StatusHandle::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use DeviceStatus::*;
    use StatusEvent::*;

    #[test]
    fn test_boot_to_ready_requires_clock_sync() {
        let mut m = StatusMachine::new();
        assert_eq!(m.current(), Init);

        // A sync success before the clock ever synced does not fake readiness.
        assert_eq!(m.apply(SyncSucceeded), Init);
        assert_eq!(m.apply(ClockSynced), Ready);
    }

    #[test]
    fn test_clock_sync_failure_holds_state() {
        let mut m = StatusMachine::new();

        // Unsynced terminal stays in Init.
        assert_eq!(m.apply(ClockSyncFailed), Init);

        // A later resync failure never degrades a running terminal.
        m.apply(ClockSynced);
        assert_eq!(m.apply(ClockSyncFailed), Ready);
    }

    #[test]
    fn test_tap_round_trip() {
        let mut m = StatusMachine::new();
        m.apply(ClockSynced);

        assert_eq!(m.apply(TapStarted), Processing);
        assert_eq!(m.apply(TapFinished), Ready);
    }

    #[test]
    fn test_exhaustion_then_recovery() {
        let mut m = StatusMachine::new();
        m.apply(ClockSynced);

        assert_eq!(m.apply(SyncExhausted), Error);
        // Still Error on repeat exhaustion reports.
        assert_eq!(m.apply(SyncExhausted), Error);
        // One success returns to Ready.
        assert_eq!(m.apply(SyncSucceeded), Ready);
    }

    #[test]
    fn test_offline_and_back() {
        let mut m = StatusMachine::new();
        m.apply(ClockSynced);

        assert_eq!(m.apply(NetworkLost), Offline);
        assert_eq!(m.apply(NetworkRestored), Ready);
    }

    #[test]
    fn test_offline_before_first_clock_sync_returns_to_init() {
        let mut m = StatusMachine::new();

        assert_eq!(m.apply(NetworkLost), Offline);
        assert_eq!(m.apply(NetworkRestored), Init);
    }

    #[test]
    fn test_maintenance_exits_to_init() {
        let mut m = StatusMachine::new();
        m.apply(ClockSynced);

        assert_eq!(m.apply(EnterMaintenance), Maintenance);
        // Network loss does not interrupt maintenance.
        assert_eq!(m.apply(NetworkLost), Maintenance);
        assert_eq!(m.apply(ExitMaintenance), Init);
        // Clock already synced once, so the next sync lands back in Ready.
        assert_eq!(m.apply(ClockSynced), Ready);
    }

    #[test]
    fn test_handle_shares_state() {
        let handle = StatusHandle::new();
        let clone = handle.clone();

        handle.apply(ClockSynced);
        assert_eq!(clone.current(), Ready);
    }
}
