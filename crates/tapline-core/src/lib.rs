//! # tapline-core: Pure Logic for the Tapline Attendance Terminal
//!
//! This crate is the **heart** of the attendance pipeline. It contains the
//! decision logic as pure types and functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Tapline Terminal Architecture                       │
//! │                                                                         │
//! │  Scanner ──► tap channel ──► ┌───────────────────────────────────────┐  │
//! │                              │        terminald (agent loop)         │  │
//! │                              └──────────────────┬────────────────────┘  │
//! │                                                 │                       │
//! │  ┌──────────────────────────────────────────────▼────────────────────┐  │
//! │  │                 ★ tapline-core (THIS CRATE) ★                     │  │
//! │  │                                                                   │  │
//! │  │  ┌───────────┐ ┌─────────────┐ ┌───────────┐ ┌────────────────┐  │  │
//! │  │  │   types   │ │    dedup    │ │  status   │ │   validation   │  │  │
//! │  │  │ Attendance│ │ TapDedupli- │ │ Status    │ │   badge id     │  │  │
//! │  │  │   Event   │ │   cator     │ │ Machine   │ │    checks      │  │  │
//! │  │  └───────────┘ └─────────────┘ └───────────┘ └────────────────┘  │  │
//! │  │                                                                   │  │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS               │  │
//! │  └──────────────────────────────┬────────────────────────────────────┘  │
//! │                                 │                                       │
//! │  ┌──────────────────────────────▼────────────────────────────────────┐  │
//! │  │              tapline-db (durable buffer + tap history)            │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (AttendanceEvent, TapDecision, DeviceStatus)
//! - [`dedup`] - Minimum-interval tap deduplication with bounded history
//! - [`status`] - The device status machine
//! - [`error`] - Domain error types
//! - [`validation`] - Badge identifier validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every decision is deterministic given its inputs;
//!    the caller supplies `now` instead of the code reading a clock
//! 2. **No I/O**: database, network, and file system access are FORBIDDEN here
//! 3. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dedup;
pub mod error;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use dedup::{TapDeduplicator, TapHistoryEntry};
pub use error::ValidationError;
pub use status::{StatusEvent, StatusHandle, StatusMachine};
pub use types::{AttendanceEvent, DeviceStatus, TapDecision};
pub use validation::validate_badge_id;

// =============================================================================
// Crate-Level Constants
// =============================================================================
// Numeric limits carried over from the terminal firmware's configuration
// surface. They are compile-time defaults; the runtime values come from the
// loaded configuration and may differ per deployment.

/// Minimum interval between two accepted taps of the same badge (30 minutes).
///
/// ## Why 30 Minutes?
/// A student or employee re-presenting a badge within half an hour is a
/// repeat of the same attendance intent (fumbled tap, double beep, curiosity),
/// not a new event. The interval suppresses those repeats at the source.
pub const MIN_TAP_INTERVAL_SECS: i64 = 30 * 60;

/// Default capacity of the durable offline event buffer.
pub const DEFAULT_MAX_OFFLINE_RECORDS: u32 = 100;

/// Default capacity of the tap-history store used for deduplication.
pub const DEFAULT_MAX_TAP_HISTORY: u32 = 50;

/// Default number of consecutive failed drain cycles before the device
/// status transitions to `Error`.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default per-request timeout against the attendance API (milliseconds).
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Default Wi-Fi association timeout (milliseconds).
///
/// Carried for the credential-store collaborator; nothing in this workspace
/// drives the radio.
pub const DEFAULT_WIFI_TIMEOUT_MS: u64 = 20_000;

/// Scanner debounce granularity (milliseconds). The reader hardware debounces
/// at this granularity before identifiers ever reach the deduplicator.
pub const DEBOUNCE_TIME_MS: u64 = 500;

/// Default sleep-window start hour (inclusive, local time).
pub const DEFAULT_SLEEP_HOUR_START: u8 = 18;

/// Default sleep-window end hour (exclusive, local time).
pub const DEFAULT_SLEEP_HOUR_END: u8 = 3;

/// Maximum accepted badge identifier length.
///
/// MIFARE UIDs are 4, 7, or 10 bytes (8-20 hex characters); 32 leaves
/// headroom for longer credential formats without admitting junk reads.
pub const MAX_BADGE_ID_LEN: usize = 32;
