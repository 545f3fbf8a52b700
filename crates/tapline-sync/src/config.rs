//! # Terminal Configuration
//!
//! The single canonical configuration schema for the terminal. Earlier
//! firmware generations duplicated these constants across per-version config
//! headers; that drift is collapsed here into one TOML file, loaded once at
//! startup and immutable afterwards.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Configuration Priority                              │
//! │                                                                         │
//! │  1. Environment Variables (highest priority, secrets only)              │
//! │     TAPLINE_API_SECRET=...                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/tapline/terminal.toml (Linux)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     pool.ntp.org, capacity 100/50, retry budget 3                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Front Gate"
//!
//! [api]
//! base_url = "https://attendance.example.org/api"
//! secret = ""            # prefer TAPLINE_API_SECRET
//!
//! [[network.wifi]]
//! ssid = "SCHOOL-LAB"
//! password = "..."
//!
//! [clock]
//! ntp_servers = ["pool.ntp.org", "time.google.com"]
//! utc_offset_minutes = 420   # UTC+7
//!
//! [buffer]
//! max_offline_records = 100
//! max_tap_history = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use tapline_core::{
    DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_MAX_OFFLINE_RECORDS, DEFAULT_MAX_RETRY_ATTEMPTS,
    DEFAULT_MAX_TAP_HISTORY, DEFAULT_SLEEP_HOUR_END, DEFAULT_SLEEP_HOUR_START,
    DEFAULT_WIFI_TIMEOUT_MS, MIN_TAP_INTERVAL_SECS,
};

// =============================================================================
// Device
// =============================================================================

/// Identity of this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4), auto-generated on first run.
    #[serde(default = "default_device_id")]
    pub id: String,

    /// Human-readable terminal name (e.g., "Front Gate").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "Attendance Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: default_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// API
// =============================================================================

/// Remote attendance API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://attendance.example.org/api`.
    #[serde(default)]
    pub base_url: String,

    /// Bearer secret. Leave empty in the file and set `TAPLINE_API_SECRET`
    /// instead; the file value is a fallback for air-gapped provisioning.
    #[serde(default)]
    pub secret: String,

    /// Per-request timeout (milliseconds).
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: String::new(),
            secret: String::new(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

// =============================================================================
// Network (credential-store collaborator surface)
// =============================================================================

/// One Wi-Fi credential pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiCredential {
    pub ssid: String,
    pub password: String,
}

/// Ordered Wi-Fi candidates handed to the credential-store collaborator.
///
/// Candidates are tried in sequence; on exhaustion the collaborator reports
/// "not connected" and starts over from the top on its next attempt. Nothing
/// in this workspace drives the radio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Candidate networks, tried in order.
    #[serde(default)]
    pub wifi: Vec<WifiCredential>,

    /// Association timeout per candidate (milliseconds).
    #[serde(default = "default_wifi_timeout_ms")]
    pub wifi_timeout_ms: u64,
}

fn default_wifi_timeout_ms() -> u64 {
    DEFAULT_WIFI_TIMEOUT_MS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            wifi: Vec::new(),
            wifi_timeout_ms: default_wifi_timeout_ms(),
        }
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Time resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Ordered list of NTP-like servers; first success wins.
    #[serde(default = "default_ntp_servers")]
    pub ntp_servers: Vec<String>,

    /// Per-server query timeout (milliseconds).
    #[serde(default = "default_ntp_timeout_ms")]
    pub ntp_timeout_ms: u64,

    /// Queries attempted per server before moving to the next.
    #[serde(default = "default_ntp_retries")]
    pub max_retries: u32,

    /// Local-time offset from UTC in minutes (420 = UTC+7).
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_ntp_servers() -> Vec<String> {
    vec!["pool.ntp.org".to_string()]
}

fn default_ntp_timeout_ms() -> u64 {
    5_000
}

fn default_ntp_retries() -> u32 {
    2
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            ntp_servers: default_ntp_servers(),
            ntp_timeout_ms: default_ntp_timeout_ms(),
            max_retries: default_ntp_retries(),
            utc_offset_minutes: 0,
        }
    }
}

impl ClockConfig {
    /// Per-server timeout as a [`Duration`].
    pub fn ntp_timeout(&self) -> Duration {
        Duration::from_millis(self.ntp_timeout_ms)
    }
}

// =============================================================================
// Buffer
// =============================================================================

/// Capacities of the durable stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Offline event buffer capacity.
    #[serde(default = "default_max_offline_records")]
    pub max_offline_records: u32,

    /// Tap-history (dedup memory) capacity.
    #[serde(default = "default_max_tap_history")]
    pub max_tap_history: u32,

    /// Minimum interval between accepted taps of one badge (seconds).
    #[serde(default = "default_min_tap_interval_secs")]
    pub min_tap_interval_secs: i64,
}

fn default_max_offline_records() -> u32 {
    DEFAULT_MAX_OFFLINE_RECORDS
}

fn default_max_tap_history() -> u32 {
    DEFAULT_MAX_TAP_HISTORY
}

fn default_min_tap_interval_secs() -> i64 {
    MIN_TAP_INTERVAL_SECS
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            max_offline_records: default_max_offline_records(),
            max_tap_history: default_max_tap_history(),
            min_tap_interval_secs: default_min_tap_interval_secs(),
        }
    }
}

impl BufferConfig {
    /// Minimum tap interval as a chrono [`chrono::Duration`].
    pub fn min_tap_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_tap_interval_secs)
    }
}

// =============================================================================
// Sync cadence
// =============================================================================

/// Drain and resync scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between buffer drain cycles (seconds).
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// Interval between clock resync attempts (seconds).
    #[serde(default = "default_resync_interval")]
    pub clock_resync_interval_secs: u64,

    /// Consecutive failed drain cycles tolerated before the device status
    /// transitions to `Error`.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
}

fn default_drain_interval() -> u64 {
    30
}

fn default_resync_interval() -> u64 {
    6 * 60 * 60
}

fn default_max_retry_attempts() -> u32 {
    DEFAULT_MAX_RETRY_ATTEMPTS
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            drain_interval_secs: default_drain_interval(),
            clock_resync_interval_secs: default_resync_interval(),
            max_retry_attempts: default_max_retry_attempts(),
        }
    }
}

// =============================================================================
// Sleep window
// =============================================================================

/// Overnight sleep window, local hours.
///
/// Consumed by an external power scheduler; the pipeline itself never gates
/// on it. Carried here so the whole configuration surface lives in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepConfig {
    /// Window start hour (inclusive, 0-23).
    #[serde(default = "default_sleep_start")]
    pub start_hour: u8,

    /// Window end hour (exclusive, 0-23).
    #[serde(default = "default_sleep_end")]
    pub end_hour: u8,
}

fn default_sleep_start() -> u8 {
    DEFAULT_SLEEP_HOUR_START
}

fn default_sleep_end() -> u8 {
    DEFAULT_SLEEP_HOUR_END
}

impl Default for SleepConfig {
    fn default() -> Self {
        SleepConfig {
            start_hour: default_sleep_start(),
            end_hour: default_sleep_end(),
        }
    }
}

impl SleepConfig {
    /// Returns true if `hour` (local, 0-23) falls inside the window.
    /// Windows may wrap midnight: start 18, end 3 covers 18..24 and 0..3.
    pub fn in_sleep_window(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

// =============================================================================
// Terminal Config
// =============================================================================

/// Complete terminal configuration. Read-only after startup; shared by all
/// components, mutated by none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub sleep: SleepConfig,
}

impl TerminalConfig {
    /// Default config file path (`~/.config/tapline/terminal.toml` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "tapline", "tapline")
            .map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    /// Loads configuration from a TOML file, then applies environment
    /// overrides. A missing file yields defaults (first boot).
    pub fn load(path: &Path) -> SyncResult<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            TerminalConfig::default()
        };

        if let Ok(secret) = std::env::var("TAPLINE_API_SECRET") {
            config.api.secret = secret;
        }

        info!(
            device_id = %config.device.id,
            api = %config.api.base_url,
            ntp_servers = config.clock.ntp_servers.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Saves the configuration (used on first boot to persist the generated
    /// device id). The API secret is not written back.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let mut to_save = self.clone();
        to_save.api.secret = String::new();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| SyncError::ConfigSaveFailed(err.to_string()))?;
        }

        let raw = toml::to_string_pretty(&to_save)?;
        std::fs::write(path, raw).map_err(|err| SyncError::ConfigSaveFailed(err.to_string()))?;
        Ok(())
    }

    /// Validates the configuration before the agent starts.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api.base_url.is_empty() {
            return Err(SyncError::InvalidConfig("api.base_url is required".into()));
        }
        url::Url::parse(&self.api.base_url)?;

        if self.clock.ntp_servers.is_empty() {
            return Err(SyncError::InvalidConfig(
                "clock.ntp_servers must list at least one server".into(),
            ));
        }

        if self.buffer.max_offline_records == 0 || self.buffer.max_tap_history == 0 {
            return Err(SyncError::InvalidConfig(
                "buffer capacities must be greater than zero".into(),
            ));
        }

        // interval() panics on a zero period, so reject it here.
        if self.sync.drain_interval_secs == 0 || self.sync.clock_resync_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync intervals must be greater than zero".into(),
            ));
        }

        if self.sleep.start_hour > 23 || self.sleep.end_hour > 23 {
            return Err(SyncError::InvalidConfig(
                "sleep hours must be in 0..=23".into(),
            ));
        }

        Ok(())
    }

    /// Drain interval as a [`Duration`].
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.sync.drain_interval_secs)
    }

    /// Clock resync interval as a [`Duration`].
    pub fn clock_resync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.clock_resync_interval_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
