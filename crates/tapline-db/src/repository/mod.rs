//! # Repository Layer
//!
//! One repository per table, each a thin cloneable wrapper over the shared
//! [`sqlx::SqlitePool`]:
//!
//! - [`outbox`] - the durable offline event buffer (bounded FIFO)
//! - [`tap_history`] - persisted dedup memory

pub mod outbox;
pub mod tap_history;
