//! # Tap History Repository
//!
//! Persists the deduplicator's last-accepted-tap memory so a power cycle
//! doesn't reopen the suppression window. One row per badge; the repository
//! prunes to the configured capacity, oldest accepted first, mirroring the
//! in-memory eviction policy.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tapline_core::TapHistoryEntry;

/// Repository for persisted dedup memory.
#[derive(Debug, Clone)]
pub struct TapHistoryRepository {
    pool: SqlitePool,
}

impl TapHistoryRepository {
    /// Creates a new TapHistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TapHistoryRepository { pool }
    }

    /// Records an accepted tap (insert or refresh).
    pub async fn record(&self, badge_id: &str, accepted_at: DateTime<Utc>) -> DbResult<()> {
        debug!(badge_id = %badge_id, "Recording accepted tap");

        sqlx::query(
            r#"
            INSERT INTO tap_history (badge_id, last_accepted_at)
            VALUES (?1, ?2)
            ON CONFLICT (badge_id) DO UPDATE SET last_accepted_at = excluded.last_accepted_at
            "#,
        )
        .bind(badge_id)
        .bind(accepted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drops the oldest-accepted rows beyond `capacity`.
    pub async fn prune(&self, capacity: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tap_history
            WHERE badge_id NOT IN (
                SELECT badge_id FROM tap_history
                ORDER BY last_accepted_at DESC
                LIMIT ?1
            )
            "#,
        )
        .bind(capacity as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Loads up to `capacity` entries, oldest accepted first - the order the
    /// deduplicator expects for seeding.
    pub async fn load(&self, capacity: u32) -> DbResult<Vec<TapHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT badge_id, last_accepted_at
            FROM tap_history
            ORDER BY last_accepted_at DESC
            LIMIT ?1
            "#,
        )
        .bind(capacity as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<TapHistoryEntry> = rows
            .into_iter()
            .map(|row| {
                Ok(TapHistoryEntry {
                    badge_id: row.try_get("badge_id")?,
                    last_accepted_at: row.try_get("last_accepted_at")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()?;

        entries.reverse(); // newest-first query, oldest-first result
        Ok(entries)
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

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_upserts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let history = db.tap_history();

        history.record("A", at(0)).await.unwrap();
        history.record("A", at(31)).await.unwrap();

        let entries = history.load(50).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_accepted_at, at(31));
    }

    #[tokio::test]
    async fn test_prune_drops_oldest_accepted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let history = db.tap_history();

        history.record("A", at(0)).await.unwrap();
        history.record("B", at(1)).await.unwrap();
        history.record("C", at(2)).await.unwrap();

        let dropped = history.prune(2).await.unwrap();
        assert_eq!(dropped, 1);

        let entries = history.load(50).await.unwrap();
        let badges: Vec<_> = entries.iter().map(|e| e.badge_id.as_str()).collect();
        assert_eq!(badges, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_load_is_oldest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let history = db.tap_history();

        history.record("NEW", at(30)).await.unwrap();
        history.record("OLD", at(0)).await.unwrap();

        let entries = history.load(50).await.unwrap();
        assert_eq!(entries[0].badge_id, "OLD");
        assert_eq!(entries[1].badge_id, "NEW");
    }
}
