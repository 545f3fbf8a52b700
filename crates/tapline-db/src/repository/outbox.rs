//! # Offline Event Buffer
//!
//! Durable bounded FIFO of attendance events awaiting delivery.
//!
//! ## The Outbox Pattern, Bounded
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      event_outbox Table                                 │
//! │                                                                         │
//! │  seq | id        | badge_id | captured_at          | local_time         │
//! │  ────┼───────────┼──────────┼──────────────────────┼────────────────────│
//! │  17  │ 9f2c-...  │ 04A1B2C3 │ 2025-03-01T01:12:09Z │ 2025-03-01 08:12:09│
//! │  18  │ 77aa-...  │ 04D4E5F6 │ 2025-03-01T01:14:33Z │ 2025-03-01 08:14:33│
//! │   ▲                                                                     │
//! │   └── AUTOINCREMENT: FIFO order survives deletes and power cycles       │
//! │                                                                         │
//! │  enqueue ──► INSERT, then evict rows beyond capacity (oldest first)     │
//! │  oldest  ──► SELECT ... ORDER BY seq ASC LIMIT 1   (peek, no removal)   │
//! │  remove  ──► DELETE by id, only after a confirmed API acknowledgment    │
//! │                                                                         │
//! │  BOUNDED-LOSS POLICY: under a prolonged outage the buffer favors        │
//! │  recency over completeness - the newest events are kept, the oldest     │
//! │  unsent ones are evicted and logged. Deliberate trade-off, not silent   │
//! │  data loss.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::DbResult;
use tapline_core::AttendanceEvent;

/// Repository for the durable offline event buffer.
#[derive(Debug, Clone)]
pub struct EventOutboxRepository {
    pool: SqlitePool,
}

impl EventOutboxRepository {
    /// Creates a new EventOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EventOutboxRepository { pool }
    }

    /// Buffers an accepted attendance event.
    ///
    /// If the buffer already holds `capacity` events, the oldest unsent
    /// events are evicted to admit the new one.
    ///
    /// ## Returns
    /// The number of evicted events (0 in normal operation).
    pub async fn enqueue(&self, event: &AttendanceEvent, capacity: u32) -> DbResult<u64> {
        let now = Utc::now();

        debug!(id = %event.id, badge_id = %event.badge_id, "Buffering event");

        sqlx::query(
            r#"
            INSERT INTO event_outbox (id, badge_id, captured_at, local_time, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&event.id)
        .bind(&event.badge_id)
        .bind(event.captured_at)
        .bind(&event.local_time)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // Keep only the newest `capacity` rows.
        let result = sqlx::query(
            r#"
            DELETE FROM event_outbox
            WHERE seq NOT IN (
                SELECT seq FROM event_outbox ORDER BY seq DESC LIMIT ?1
            )
            "#,
        )
        .bind(capacity as i64)
        .execute(&self.pool)
        .await?;

        let evicted = result.rows_affected();
        if evicted > 0 {
            warn!(
                evicted,
                capacity, "Offline buffer full: evicted oldest unsent events"
            );
        }

        Ok(evicted)
    }

    /// Peeks the oldest buffered event without removing it.
    pub async fn oldest(&self) -> DbResult<Option<AttendanceEvent>> {
        let event = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT id, badge_id, captured_at, local_time
            FROM event_outbox
            ORDER BY seq ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Removes an event after its submission was acknowledged.
    pub async fn remove(&self, id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM event_outbox WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of buffered events.
    pub async fn len(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_outbox")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// All buffered events, oldest first (diagnostics and tests).
    pub async fn all(&self) -> DbResult<Vec<AttendanceEvent>> {
        let events = sqlx::query_as::<_, AttendanceEvent>(
            r#"
            SELECT id, badge_id, captured_at, local_time
            FROM event_outbox
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    fn event(badge: &str) -> AttendanceEvent {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        AttendanceEvent::new(badge, at, 7 * 60)
    }

    #[tokio::test]
    async fn test_enqueue_and_peek_fifo() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let e1 = event("A");
        let e2 = event("B");
        outbox.enqueue(&e1, 100).await.unwrap();
        outbox.enqueue(&e2, 100).await.unwrap();

        assert_eq!(outbox.len().await.unwrap(), 2);

        // Peek does not remove.
        let oldest = outbox.oldest().await.unwrap().unwrap();
        assert_eq!(oldest, e1);
        assert_eq!(outbox.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_capacity_eviction_keeps_newest_in_order() {
        // Capacity 3, enqueue E1..E4 => buffer is exactly [E2, E3, E4].
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let events: Vec<_> = ["E1", "E2", "E3", "E4"].iter().map(|b| event(b)).collect();

        for (i, e) in events.iter().enumerate() {
            let evicted = outbox.enqueue(e, 3).await.unwrap();
            assert_eq!(evicted, if i < 3 { 0 } else { 1 });
        }

        let remaining = outbox.all().await.unwrap();
        let badges: Vec<_> = remaining.iter().map(|e| e.badge_id.as_str()).collect();
        assert_eq!(badges, vec!["E2", "E3", "E4"]);
        assert_eq!(outbox.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove_is_by_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let e1 = event("A");
        let e2 = event("B");
        outbox.enqueue(&e1, 100).await.unwrap();
        outbox.enqueue(&e2, 100).await.unwrap();

        outbox.remove(&e1.id).await.unwrap();

        let oldest = outbox.oldest().await.unwrap().unwrap();
        assert_eq!(oldest.id, e2.id);
        assert_eq!(outbox.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_event_round_trips_timestamps() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let e = event("04A1B2C3");
        outbox.enqueue(&e, 100).await.unwrap();

        let stored = outbox.oldest().await.unwrap().unwrap();
        assert_eq!(stored.captured_at, e.captured_at);
        assert_eq!(stored.local_time, "2025-03-01 15:00:00");
    }

    #[tokio::test]
    async fn test_buffer_survives_reopen() {
        // File-backed database: buffered events must outlive the pool.
        let path = std::env::temp_dir().join(format!("tapline-test-{}.db", uuid::Uuid::new_v4()));

        let e = event("DURABLE");
        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            db.outbox().enqueue(&e, 100).await.unwrap();
            db.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let stored = db.outbox().oldest().await.unwrap().unwrap();
        assert_eq!(stored, e);
        db.close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
