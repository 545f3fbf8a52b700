//! # tapline-db: Database Layer for the Tapline Terminal
//!
//! SQLite-backed storage behind the attendance pipeline: the durable offline
//! event buffer and the persisted tap history, accessed asynchronously with
//! sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tapline Data Flow                                 │
//! │                                                                         │
//! │  agent loop (accepted tap / drain cycle)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    tapline-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐   ┌───────────────────┐   ┌─────────────┐  │    │
//! │  │   │   Database    │   │   Repositories    │   │ Migrations  │  │    │
//! │  │   │   (pool.rs)   │◄──│ EventOutboxRepo   │   │ (embedded)  │  │    │
//! │  │   │  SqlitePool   │   │ TapHistoryRepo    │   │ 001_init.sql│  │    │
//! │  │   └───────────────┘   └───────────────────┘   └─────────────┘  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL) - buffered events survive power cycles               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tapline_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("terminal.db")).await?;
//! db.outbox().enqueue(&event, 100).await?;
//! let pending = db.outbox().oldest().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::outbox::EventOutboxRepository;
pub use repository::tap_history::TapHistoryRepository;
