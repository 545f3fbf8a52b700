//! # Domain Types
//!
//! Core domain types used throughout the Tapline terminal.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                                   │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │ AttendanceEvent  │   │   TapDecision    │   │   DeviceStatus   │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  id (UUID)       │   │  Accept          │   │  Init            │    │
//! │  │  badge_id        │   │  Suppress        │   │  Ready           │    │
//! │  │  captured_at     │   └──────────────────┘   │  Processing      │    │
//! │  │  local_time      │                          │  Error           │    │
//! │  └──────────────────┘                          │  Offline         │    │
//! │                                                │  Maintenance     │    │
//! │                                                └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Timestamp Pattern
//! Every event carries both `captured_at` (UTC, machine-ordered) and
//! `local_time` (pre-rendered local wall-clock string). The API consumes the
//! local string; everything else in the pipeline orders by the UTC instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Attendance Event
// =============================================================================

/// One accepted badge tap, queued for delivery to the attendance API.
///
/// Immutable once stored: an event is created when a tap is accepted and
/// destroyed either on a successful sync acknowledgment or by FIFO eviction
/// when the offline buffer is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AttendanceEvent {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The credential tag presented to the reader.
    pub badge_id: String,

    /// Capture instant in UTC. Orders the buffer and drives deduplication.
    pub captured_at: DateTime<Utc>,

    /// Human-readable local wall-clock stamp (`YYYY-MM-DD HH:MM:SS`),
    /// rendered at capture time so it survives later clock adjustments.
    pub local_time: String,
}

impl AttendanceEvent {
    /// Creates a new event for an accepted tap.
    ///
    /// ## Arguments
    /// * `badge_id` - validated credential identifier
    /// * `captured_at` - UTC capture instant
    /// * `utc_offset_minutes` - local-time offset used to render `local_time`
    pub fn new(badge_id: &str, captured_at: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        let local = captured_at + chrono::Duration::minutes(utc_offset_minutes as i64);

        AttendanceEvent {
            id: Uuid::new_v4().to_string(),
            badge_id: badge_id.to_string(),
            captured_at,
            local_time: local.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// =============================================================================
// Tap Decision
// =============================================================================

/// Outcome of evaluating a scanned identifier against the tap history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapDecision {
    /// A new attendance event; record it and buffer it.
    Accept,

    /// A repeat within the minimum tap interval; drop silently.
    Suppress,
}

impl TapDecision {
    /// Returns true for [`TapDecision::Accept`].
    #[inline]
    pub const fn is_accept(&self) -> bool {
        matches!(self, TapDecision::Accept)
    }
}

// =============================================================================
// Device Status
// =============================================================================

/// The single authoritative operating state of the terminal.
///
/// Exactly one value holds at any instant. Transitions are driven by the
/// sync engine and the clock sync service through
/// [`crate::status::StatusMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Booting: no successful clock sync yet.
    Init,

    /// Idle and operational.
    Ready,

    /// Handling a tap or a sync cycle.
    Processing,

    /// The sync engine exhausted its retry budget; taps still buffer.
    Error,

    /// No network path available; the buffer keeps accepting writes.
    Offline,

    /// Operator-commanded maintenance; exits back to `Init` on resume.
    Maintenance,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Init => write!(f, "init"),
            DeviceStatus::Ready => write!(f, "ready"),
            DeviceStatus::Processing => write!(f, "processing"),
            DeviceStatus::Error => write!(f, "error"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
