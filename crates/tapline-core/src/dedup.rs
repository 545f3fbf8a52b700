//! # Tap Deduplicator
//!
//! Decides whether a scanned identifier is a new attendance event or a
//! suppressed repeat, using a bounded per-identifier history.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       evaluate(badge_id, now)                           │
//! │                                                                         │
//! │  history lookup by badge_id                                             │
//! │       │                                                                 │
//! │       ├── no entry ─────────────────────────► Accept, record now        │
//! │       │                                                                 │
//! │       ├── now - last >= min_interval ───────► Accept, record now        │
//! │       │                                                                 │
//! │       └── now - last <  min_interval ───────► Suppress                  │
//! │                                                                         │
//! │  CAPACITY: at most `capacity` identifiers are remembered. Admitting a   │
//! │  new identifier to a full store evicts the oldest entry. Eviction only  │
//! │  affects dedup MEMORY - already-buffered events are never touched.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The firmware this replaces kept a flat ring of the last 50 taps; here the
//! store is identifier-keyed with oldest-first eviction, which preserves the
//! interval invariant while making lookup by identifier direct.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::types::TapDecision;

// =============================================================================
// Tap History Entry
// =============================================================================

/// Last-accepted-tap record for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapHistoryEntry {
    /// The credential tag.
    pub badge_id: String,

    /// When a tap of this badge was last accepted.
    pub last_accepted_at: DateTime<Utc>,
}

// =============================================================================
// Tap Deduplicator
// =============================================================================

/// Bounded tap-history store with minimum-interval suppression.
///
/// Entries are held oldest-accepted-first; an accepted tap moves its badge to
/// the back, so the front is always the eviction candidate.
#[derive(Debug, Clone)]
pub struct TapDeduplicator {
    /// History entries, ordered by last accepted time (oldest first).
    entries: VecDeque<TapHistoryEntry>,

    /// Maximum number of identifiers remembered.
    capacity: usize,

    /// Minimum time between two accepted taps of the same identifier.
    min_interval: Duration,
}

impl TapDeduplicator {
    /// Creates an empty deduplicator.
    ///
    /// ## Arguments
    /// * `capacity` - maximum identifiers remembered (must be > 0)
    /// * `min_interval` - minimum accepted-tap spacing per identifier
    pub fn new(capacity: usize, min_interval: Duration) -> Self {
        TapDeduplicator {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            min_interval,
        }
    }

    /// Creates a deduplicator seeded from persisted history.
    ///
    /// Entries must be ordered oldest-accepted-first (the order the history
    /// repository returns them). Excess entries beyond `capacity` are dropped
    /// from the oldest end.
    pub fn with_entries(
        capacity: usize,
        min_interval: Duration,
        entries: impl IntoIterator<Item = TapHistoryEntry>,
    ) -> Self {
        let mut dedup = Self::new(capacity, min_interval);
        for entry in entries {
            if dedup.entries.len() == dedup.capacity {
                dedup.entries.pop_front();
            }
            dedup.entries.push_back(entry);
        }
        dedup
    }

    /// Evaluates a tap at `now` without touching the history.
    ///
    /// Returns [`TapDecision::Accept`] if the badge is unknown or its previous
    /// accepted tap is at least the minimum interval old,
    /// [`TapDecision::Suppress`] otherwise. An accept is not committed until
    /// the caller invokes [`TapDeduplicator::record`] - the window must not
    /// burn before the event is durably buffered, or a storage fault would
    /// suppress every re-tap for the full interval with nothing saved.
    pub fn check(&self, badge_id: &str, now: DateTime<Utc>) -> TapDecision {
        match self.last_accepted(badge_id) {
            Some(last) if now - last < self.min_interval => TapDecision::Suppress,
            _ => TapDecision::Accept,
        }
    }

    /// Commits an accepted tap: records `now` as the identifier's new
    /// last-accepted time.
    ///
    /// Call only after the event is durably buffered.
    pub fn record(&mut self, badge_id: &str, now: DateTime<Utc>) {
        if let Some(pos) = self.entries.iter().position(|e| e.badge_id == badge_id) {
            // Re-accepted: refresh the timestamp and move to the back.
            if let Some(mut entry) = self.entries.remove(pos) {
                entry.last_accepted_at = now;
                self.entries.push_back(entry);
            }
            return;
        }

        // New identifier. A full store loses its oldest dedup memory.
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(TapHistoryEntry {
            badge_id: badge_id.to_string(),
            last_accepted_at: now,
        });
    }

    /// Check-and-commit in one step, for callers with no failure path between
    /// the decision and the durable write.
    pub fn evaluate(&mut self, badge_id: &str, now: DateTime<Utc>) -> TapDecision {
        let decision = self.check(badge_id, now);
        if decision.is_accept() {
            self.record(badge_id, now);
        }
        decision
    }

    /// Returns the last-accepted time for an identifier, if remembered.
    pub fn last_accepted(&self, badge_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|e| e.badge_id == badge_id)
            .map(|e| e.last_accepted_at)
    }

    /// Number of identifiers currently remembered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no identifiers are remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the history oldest-accepted-first (for persistence).
    pub fn entries(&self) -> impl Iterator<Item = &TapHistoryEntry> {
        self.entries.iter()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIN_TAP_INTERVAL_SECS;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn interval() -> Duration {
        Duration::seconds(MIN_TAP_INTERVAL_SECS)
    }

    #[test]
    fn test_accept_suppress_accept_scenario() {
        // t=0 Accept, t=5min Suppress, t=31min Accept
        let mut dedup = TapDeduplicator::new(50, interval());

        assert_eq!(dedup.evaluate("X", t0()), TapDecision::Accept);
        assert_eq!(
            dedup.evaluate("X", t0() + Duration::minutes(5)),
            TapDecision::Suppress
        );
        assert_eq!(
            dedup.evaluate("X", t0() + Duration::minutes(31)),
            TapDecision::Accept
        );
    }

    #[test]
    fn test_exact_interval_boundary_accepts() {
        // now - last >= min_interval accepts; 30:00 sharp is a new event.
        let mut dedup = TapDeduplicator::new(50, interval());

        assert_eq!(dedup.evaluate("X", t0()), TapDecision::Accept);
        assert_eq!(
            dedup.evaluate("X", t0() + Duration::minutes(30)),
            TapDecision::Accept
        );
    }

    #[test]
    fn test_identifiers_are_independent() {
        let mut dedup = TapDeduplicator::new(50, interval());

        assert_eq!(dedup.evaluate("A", t0()), TapDecision::Accept);
        assert_eq!(
            dedup.evaluate("B", t0() + Duration::seconds(1)),
            TapDecision::Accept
        );
        assert_eq!(
            dedup.evaluate("A", t0() + Duration::minutes(1)),
            TapDecision::Suppress
        );
    }

    #[test]
    fn test_accepted_taps_never_closer_than_interval() {
        // Hammer one badge every minute for two hours; accepted taps must
        // stay >= 30 minutes apart.
        let mut dedup = TapDeduplicator::new(50, interval());
        let mut accepted: Vec<DateTime<Utc>> = Vec::new();

        for minute in 0..120 {
            let now = t0() + Duration::minutes(minute);
            if dedup.evaluate("X", now).is_accept() {
                accepted.push(now);
            }
        }

        assert_eq!(accepted.len(), 4); // 0, 30, 60, 90
        for pair in accepted.windows(2) {
            assert!(pair[1] - pair[0] >= interval());
        }
    }

    #[test]
    fn test_full_store_evicts_oldest_identifier() {
        let mut dedup = TapDeduplicator::new(2, interval());

        dedup.evaluate("A", t0());
        dedup.evaluate("B", t0() + Duration::seconds(1));
        dedup.evaluate("C", t0() + Duration::seconds(2)); // evicts A

        assert_eq!(dedup.len(), 2);
        assert!(dedup.last_accepted("A").is_none());

        // A's dedup memory is gone: an immediate repeat is accepted again.
        assert_eq!(
            dedup.evaluate("A", t0() + Duration::seconds(3)),
            TapDecision::Accept
        );
    }

    #[test]
    fn test_reaccept_moves_badge_to_back() {
        let mut dedup = TapDeduplicator::new(2, interval());

        dedup.evaluate("A", t0());
        dedup.evaluate("B", t0() + Duration::seconds(1));
        // A re-accepted after the interval: now newest, so B is the eviction
        // candidate when C arrives.
        dedup.evaluate("A", t0() + Duration::minutes(31));
        dedup.evaluate("C", t0() + Duration::minutes(32));

        assert!(dedup.last_accepted("A").is_some());
        assert!(dedup.last_accepted("B").is_none());
    }

    #[test]
    fn test_check_does_not_commit() {
        let mut dedup = TapDeduplicator::new(50, interval());
        assert_eq!(dedup.check("X", t0()), TapDecision::Accept);
        // Checking never opens the window: an immediate re-check still
        // accepts, and nothing is remembered.
        assert_eq!(dedup.check("X", t0()), TapDecision::Accept);
        assert!(dedup.is_empty());

        // Only record commits.
        dedup.record("X", t0());
        assert_eq!(
            dedup.check("X", t0() + Duration::minutes(5)),
            TapDecision::Suppress
        );
    }

    #[test]
    fn test_seeding_from_persisted_history() {
        let entries = vec![
            TapHistoryEntry {
                badge_id: "A".into(),
                last_accepted_at: t0(),
            },
            TapHistoryEntry {
                badge_id: "B".into(),
                last_accepted_at: t0() + Duration::minutes(10),
            },
        ];

        let mut dedup = TapDeduplicator::with_entries(50, interval(), entries);
        assert_eq!(dedup.len(), 2);

        // Dedup memory survived: B at +15min is still inside the window.
        assert_eq!(
            dedup.evaluate("B", t0() + Duration::minutes(15)),
            TapDecision::Suppress
        );
    }

    #[test]
    fn test_seeding_respects_capacity() {
        let entries = (0..5).map(|i| TapHistoryEntry {
            badge_id: format!("B{i}"),
            last_accepted_at: t0() + Duration::seconds(i),
        });

        let dedup = TapDeduplicator::with_entries(3, interval(), entries);
        assert_eq!(dedup.len(), 3);
        assert!(dedup.last_accepted("B0").is_none());
        assert!(dedup.last_accepted("B4").is_some());
    }
}
