//! # Clock Sync Service
//!
//! Resolves wall-clock time from an ordered list of NTP servers. The terminal
//! has no battery-backed RTC, so every boot starts with a meaningless clock;
//! nothing that stamps an attendance event runs until this service reports a
//! first successful sync.
//!
//! ## Resolution Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Time Resolution                                   │
//! │                                                                         │
//! │   servers: [primary, fallback-1, fallback-2]    (config order)          │
//! │                                                                         │
//! │   for server in servers:                                                │
//! │       for attempt in 1..=max_retries:                                   │
//! │           SNTP query, per-attempt timeout ──► success? ──► DONE         │
//! │                                                                         │
//! │   all exhausted ──► ClockError::AllServersUnreachable                   │
//! │                     (terminal proceeds unsynced, status stays degraded) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A later server answering does NOT shadow an earlier one: the list is a
//! strict preference order, and the first success wins.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::ClockConfig;
use crate::error::ClockError;

/// Offset between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
const NTP_UNIX_EPOCH_DELTA: u64 = 2_208_988_800;

/// SNTP packet size (RFC 4330, no authentication fields).
const SNTP_PACKET_LEN: usize = 48;

/// Byte offset of the transmit timestamp inside the response.
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

// =============================================================================
// Time Query Trait
// =============================================================================

/// A single time query against one server.
///
/// Seam for tests: the production implementation speaks SNTP over UDP, test
/// doubles script per-server outcomes.
#[async_trait]
pub trait TimeQuery: Send + Sync {
    async fn query(&self, server: &str, timeout: Duration) -> Result<DateTime<Utc>, ClockError>;
}

// =============================================================================
// SNTP over UDP
// =============================================================================

/// Minimal SNTP client (RFC 4330). Sends a client-mode request and reads the
/// transmit timestamp from the reply; round-trip compensation is deliberately
/// omitted - attendance stamps tolerate sub-second error.
#[derive(Debug, Default)]
pub struct SntpQuery;

#[async_trait]
impl TimeQuery for SntpQuery {
    async fn query(&self, server: &str, timeout: Duration) -> Result<DateTime<Utc>, ClockError> {
        let result = tokio::time::timeout(timeout, self.exchange(server)).await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ClockError::QueryFailed {
                server: server.to_string(),
                reason: "timed out".to_string(),
            }),
        }
    }
}

impl SntpQuery {
    async fn exchange(&self, server: &str) -> Result<DateTime<Utc>, ClockError> {
        let to_query_err = |err: std::io::Error| ClockError::QueryFailed {
            server: server.to_string(),
            reason: err.to_string(),
        };

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(to_query_err)?;
        socket
            .connect((server, 123))
            .await
            .map_err(to_query_err)?;

        // LI=0, VN=4, Mode=3 (client); all other fields zero.
        let mut request = [0u8; SNTP_PACKET_LEN];
        request[0] = 0x23;
        socket.send(&request).await.map_err(to_query_err)?;

        let mut response = [0u8; SNTP_PACKET_LEN];
        let read = socket.recv(&mut response).await.map_err(to_query_err)?;

        if read < SNTP_PACKET_LEN {
            return Err(ClockError::MalformedResponse {
                server: server.to_string(),
            });
        }

        parse_transmit_timestamp(&response).ok_or(ClockError::MalformedResponse {
            server: server.to_string(),
        })
    }
}

/// Extracts the transmit timestamp (seconds + fraction since the NTP epoch)
/// and converts it to UTC. Returns None for the all-zero timestamp a server
/// sends when it is itself unsynchronized.
fn parse_transmit_timestamp(packet: &[u8; SNTP_PACKET_LEN]) -> Option<DateTime<Utc>> {
    let field = &packet[TRANSMIT_TIMESTAMP_OFFSET..TRANSMIT_TIMESTAMP_OFFSET + 8];

    let seconds = u32::from_be_bytes([field[0], field[1], field[2], field[3]]) as u64;
    let fraction = u32::from_be_bytes([field[4], field[5], field[6], field[7]]) as u64;

    if seconds == 0 {
        return None;
    }

    let unix_secs = seconds.checked_sub(NTP_UNIX_EPOCH_DELTA)? as i64;
    let nanos = (fraction * 1_000_000_000) >> 32;

    Utc.timestamp_opt(unix_secs, nanos as u32).single()
}

// =============================================================================
// Clock Sync Service
// =============================================================================

/// Walks the configured server list, first success wins.
pub struct ClockSyncService<Q: TimeQuery = SntpQuery> {
    servers: Vec<String>,
    timeout: Duration,
    max_retries: u32,
    query: Q,
}

impl ClockSyncService<SntpQuery> {
    /// Creates a service backed by the real SNTP client.
    pub fn new(config: &ClockConfig) -> Self {
        ClockSyncService::with_query(config, SntpQuery)
    }
}

impl<Q: TimeQuery> ClockSyncService<Q> {
    /// Creates a service with a custom query backend.
    pub fn with_query(config: &ClockConfig, query: Q) -> Self {
        ClockSyncService {
            servers: config.ntp_servers.clone(),
            timeout: config.ntp_timeout(),
            max_retries: config.max_retries.max(1),
            query,
        }
    }

    /// Resolves current UTC time. Servers are tried strictly in config order,
    /// each with its own retry budget; the first successful answer is
    /// returned without consulting later servers.
    pub async fn resolve_time(&self) -> Result<DateTime<Utc>, ClockError> {
        for server in &self.servers {
            for attempt in 1..=self.max_retries {
                match self.query.query(server, self.timeout).await {
                    Ok(now) => {
                        info!(server = %server, time = %now, "Clock synchronized");
                        return Ok(now);
                    }
                    Err(err) => {
                        debug!(
                            server = %server,
                            attempt,
                            max = self.max_retries,
                            error = %err,
                            "Time query failed"
                        );
                    }
                }
            }
            warn!(server = %server, "Time server exhausted retry budget");
        }

        warn!("All time servers unreachable");
        Err(ClockError::AllServersUnreachable)
    }
}

// =============================================================================
// Shared Clock
// =============================================================================

/// Last successful sync: resolved wall time paired with the monotonic instant
/// it was resolved at.
#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    wall: DateTime<Utc>,
    at: Instant,
}

/// Process-wide clock handle. Until the first sync it falls back to the host
/// clock and reports unsynced; afterwards it extrapolates from the last sync
/// point using the monotonic clock, immune to host clock steps.
#[derive(Clone, Default)]
pub struct SharedClock {
    inner: Arc<Mutex<Option<SyncPoint>>>,
}

impl SharedClock {
    pub fn new() -> Self {
        SharedClock::default()
    }

    /// Records a successful time resolution.
    pub fn mark_synced(&self, wall: DateTime<Utc>) {
        let point = SyncPoint {
            wall,
            at: Instant::now(),
        };
        match self.inner.lock() {
            Ok(mut guard) => *guard = Some(point),
            Err(poisoned) => *poisoned.into_inner() = Some(point),
        }
    }

    /// True once any sync has succeeded since boot.
    pub fn is_synced(&self) -> bool {
        match self.inner.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Current UTC time, extrapolated from the last sync point. Falls back to
    /// the host clock before the first sync.
    pub fn now(&self) -> DateTime<Utc> {
        let point = match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };

        match point {
            Some(point) => {
                let elapsed = point.at.elapsed();
                point.wall
                    + chrono::Duration::milliseconds(elapsed.as_millis().min(i64::MAX as u128) as i64)
            }
            None => Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Scripted query backend: records call order, answers per server.
    struct ScriptedQuery {
        calls: StdMutex<Vec<String>>,
        /// (server, succeed) pairs; unlisted servers always fail.
        good: Vec<String>,
    }

    impl ScriptedQuery {
        fn new(good: &[&str]) -> Self {
            ScriptedQuery {
                calls: StdMutex::new(Vec::new()),
                good: good.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TimeQuery for ScriptedQuery {
        async fn query(
            &self,
            server: &str,
            _timeout: Duration,
        ) -> Result<DateTime<Utc>, ClockError> {
            self.calls.lock().unwrap().push(server.to_string());
            if self.good.iter().any(|s| s == server) {
                Ok(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap())
            } else {
                Err(ClockError::QueryFailed {
                    server: server.to_string(),
                    reason: "unreachable".into(),
                })
            }
        }
    }

    fn config(servers: &[&str], retries: u32) -> ClockConfig {
        ClockConfig {
            ntp_servers: servers.iter().map(|s| s.to_string()).collect(),
            ntp_timeout_ms: 100,
            max_retries: retries,
            utc_offset_minutes: 0,
        }
    }

    #[tokio::test]
    async fn test_first_server_success_short_circuits() {
        let query = ScriptedQuery::new(&["primary"]);
        let service = ClockSyncService::with_query(&config(&["primary", "fallback"], 2), query);

        let resolved = service.resolve_time().await.unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
        assert_eq!(service.query.calls(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fallback_after_retry_budget() {
        let query = ScriptedQuery::new(&["fallback"]);
        let service = ClockSyncService::with_query(&config(&["primary", "fallback"], 3), query);

        service.resolve_time().await.unwrap();

        // Primary burns its full budget before the fallback is consulted.
        assert_eq!(
            service.query.calls(),
            vec!["primary", "primary", "primary", "fallback"]
        );
    }

    #[tokio::test]
    async fn test_all_servers_unreachable() {
        let query = ScriptedQuery::new(&[]);
        let service = ClockSyncService::with_query(&config(&["a", "b"], 2), query);

        let err = service.resolve_time().await.unwrap_err();
        assert!(matches!(err, ClockError::AllServersUnreachable));
        assert_eq!(service.query.calls().len(), 4);
    }

    #[test]
    fn test_parse_transmit_timestamp() {
        let mut packet = [0u8; SNTP_PACKET_LEN];
        // 2025-03-01 08:00:00 UTC = 1740816000 Unix = 3949804800 NTP.
        let ntp_secs: u32 = 3_949_804_800;
        packet[40..44].copy_from_slice(&ntp_secs.to_be_bytes());

        let parsed = parse_transmit_timestamp(&packet).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_zero_timestamp() {
        let packet = [0u8; SNTP_PACKET_LEN];
        assert!(parse_transmit_timestamp(&packet).is_none());
    }

    #[test]
    fn test_shared_clock_unsynced_fallback() {
        let clock = SharedClock::new();
        assert!(!clock.is_synced());

        // Host-clock fallback still yields a plausible time.
        let now = clock.now();
        assert!(now.timestamp() > 0);
    }

    #[test]
    fn test_shared_clock_extrapolates_from_sync_point() {
        let clock = SharedClock::new();
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        clock.mark_synced(base);

        assert!(clock.is_synced());
        let now = clock.now();
        assert!(now >= base);
        assert!(now - base < chrono::Duration::seconds(5));
    }
}
