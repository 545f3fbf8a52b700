//! # tapline-sync: Clock, Transport, and Sync Orchestration
//!
//! Everything between the durable buffer and the outside world: NTP clock
//! resolution, HTTPS event submission, the drain engine, and the agent loop
//! that ties them to the tap path.
//!
//! ## Crate Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         tapline-sync                                    │
//! │                                                                         │
//! │  config.rs     TerminalConfig (TOML + env overrides)                    │
//! │  clock.rs      ClockSyncService (ordered SNTP servers), SharedClock     │
//! │  transport.rs  EventTransport trait, HttpTransport (reqwest)            │
//! │  engine.rs     SyncEngine::drain_once - oldest-first, stop-on-failure   │
//! │  agent.rs      TapAgent event loop + AgentHandle                        │
//! │  error.rs      TransportError / ClockError / SyncError                  │
//! │                                                                         │
//! │  tap ──► agent ──► dedup ──► outbox ──► engine ──► transport ──► API    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentHandle, TapAgent};
pub use clock::{ClockSyncService, SharedClock, SntpQuery, TimeQuery};
pub use config::TerminalConfig;
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{ClockError, SyncError, SyncResult, TransportError};
pub use transport::{EventTransport, HttpTransport};
