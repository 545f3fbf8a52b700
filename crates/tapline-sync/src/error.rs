//! # Sync Error Types
//!
//! Error types for clock sync, transport, and the sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────────┐  ┌───────────────────────┐  │
//! │  │  Configuration  │  │    Transport     │  │        Clock          │  │
//! │  │                 │  │                  │  │                       │  │
//! │  │  InvalidConfig  │  │  Timeout         │  │  AllServersUnreachable│  │
//! │  │  ConfigLoad     │  │  AuthRejected    │  │  QueryFailed          │  │
//! │  │  ConfigSave     │  │  ServerError     │  │  MalformedResponse    │  │
//! │  │                 │  │  Network         │  │                       │  │
//! │  └─────────────────┘  └──────────────────┘  └───────────────────────┘  │
//! │                                                                         │
//! │  CONTAINMENT: every failure here degrades the terminal (deferred sync,  │
//! │  reduced timestamp precision, status flag) - nothing is fatal to the    │
//! │  process, and nothing propagates past the engine or the clock service   │
//! │  as an unhandled fault.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Failures submitting an event to the attendance API.
///
/// All variants are recoverable at the sync engine level via retry counting.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request exceeded the configured HTTP timeout.
    #[error("Request timed out")]
    Timeout,

    /// The API rejected the configured secret (401/403).
    #[error("API rejected credentials")]
    AuthRejected,

    /// The API answered with a server-side failure.
    #[error("API server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Connection-level failure (DNS, refused, reset, no route).
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

// =============================================================================
// Clock Errors
// =============================================================================

/// Failures resolving wall-clock time.
///
/// Recoverable: the terminal proceeds on last-known time with a degraded
/// "unsynced" marker.
#[derive(Debug, Clone, Error)]
pub enum ClockError {
    /// Every configured time server exhausted its retry budget.
    #[error("All time servers unreachable")]
    AllServersUnreachable,

    /// One query attempt failed (timeout, socket error).
    #[error("Time query to {server} failed: {reason}")]
    QueryFailed { server: String, reason: String },

    /// A server answered with something that isn't a valid timestamp.
    #[error("Malformed time response from {server}")]
    MalformedResponse { server: String },
}

// =============================================================================
// Sync Errors
// =============================================================================

/// Umbrella error for the sync layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid terminal configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Storage failure underneath the buffer or tap history.
    #[error("Database error: {0}")]
    Database(String),

    /// A scanned identifier failed validation before dedup.
    #[error("Rejected badge id: {0}")]
    Validation(#[from] tapline_core::ValidationError),

    /// Submission failure (carried for logging; the engine turns these into
    /// outcome values, not propagated faults).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Clock resolution failure.
    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// Channel send/receive failed (agent shutting down).
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<tapline_db::DbError> for SyncError {
    fn from(err: tapline_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the operation can be retried on a later cycle.
    ///
    /// Transport and clock failures are transient by design; configuration
    /// errors are not - retrying them without operator intervention cannot
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Clock(_) | SyncError::Database(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Transport(TransportError::Timeout).is_retryable());
        assert!(SyncError::Clock(ClockError::AllServersUnreachable).is_retryable());

        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(SyncError::InvalidConfig("bad".into()).is_config_error());
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ServerError { status: 503 };
        assert!(err.to_string().contains("503"));
    }
}
