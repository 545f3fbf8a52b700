//! # Attendance API Transport
//!
//! Submits buffered attendance events to the remote API as JSON over HTTPS,
//! authenticated with a bearer secret. The payload is opaque to the rest of
//! the pipeline - the sync engine only sees ok / failed.
//!
//! ## Request Shape
//! ```text
//! POST {base_url}/attendance
//! Authorization: Bearer {secret}
//!
//! {
//!   "device_id": "550e8400-...",
//!   "event_id":  "9b2f1c44-...",
//!   "badge_id":  "04:A3:2B:1C",
//!   "timestamp": "2025-03-01T08:00:00Z",
//!   "local_time": "2025-03-01 15:00:00"
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::{ApiConfig, DeviceConfig};
use crate::error::TransportError;
use tapline_core::AttendanceEvent;

// =============================================================================
// Transport Trait
// =============================================================================

/// Delivery of one event to the remote API.
///
/// The sync engine is written against this trait; tests substitute scripted
/// transports to exercise failure paths without a network.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Submits one event. `Ok(())` means the server durably accepted it and
    /// the caller may remove it from the buffer.
    async fn submit(&self, event: &AttendanceEvent) -> Result<(), TransportError>;
}

// =============================================================================
// Wire Payload
// =============================================================================

#[derive(Debug, Serialize)]
struct AttendancePayload<'a> {
    device_id: &'a str,
    event_id: &'a str,
    badge_id: &'a str,
    timestamp: chrono::DateTime<chrono::Utc>,
    local_time: &'a str,
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Production transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
    device_id: String,
}

impl HttpTransport {
    /// Creates a transport from the API and device configuration.
    pub fn new(api: &ApiConfig, device: &DeviceConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(api.http_timeout())
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;

        Ok(HttpTransport {
            client,
            endpoint: format!("{}/attendance", api.base_url.trim_end_matches('/')),
            secret: api.secret.clone(),
            device_id: device.id.clone(),
        })
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn submit(&self, event: &AttendanceEvent) -> Result<(), TransportError> {
        let payload = AttendancePayload {
            device_id: &self.device_id,
            event_id: &event.id,
            badge_id: &event.badge_id,
            timestamp: event.captured_at,
            local_time: &event.local_time,
        };

        debug!(event_id = %event.id, endpoint = %self.endpoint, "Submitting event");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret)
            .json(&payload)
            .send()
            .await?;

        classify_status(response.status().as_u16())
    }
}

/// Maps an HTTP status to a transport outcome. Any 2xx is acceptance; the
/// server is free to answer 200 or 201.
fn classify_status(status: u16) -> Result<(), TransportError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(TransportError::AuthRejected),
        other => Err(TransportError::ServerError { status: other }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_classify_status() {
        assert!(classify_status(200).is_ok());
        assert!(classify_status(201).is_ok());

        assert!(matches!(
            classify_status(401),
            Err(TransportError::AuthRejected)
        ));
        assert!(matches!(
            classify_status(403),
            Err(TransportError::AuthRejected)
        ));
        assert!(matches!(
            classify_status(503),
            Err(TransportError::ServerError { status: 503 })
        ));
        assert!(matches!(
            classify_status(422),
            Err(TransportError::ServerError { status: 422 })
        ));
    }

    #[test]
    fn test_payload_shape() {
        let captured = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let event = AttendanceEvent::new("04:A3:2B:1C", captured, 420);

        let payload = AttendancePayload {
            device_id: "dev-1",
            event_id: &event.id,
            badge_id: &event.badge_id,
            timestamp: event.captured_at,
            local_time: &event.local_time,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["device_id"], "dev-1");
        assert_eq!(json["badge_id"], "04:A3:2B:1C");
        assert_eq!(json["timestamp"], "2025-03-01T08:00:00Z");
        assert_eq!(json["local_time"], "2025-03-01 15:00:00");
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let api = ApiConfig {
            base_url: "https://attendance.example.org/api/".into(),
            secret: "s".into(),
            http_timeout_ms: 1000,
        };
        let device = DeviceConfig::default();

        let transport = HttpTransport::new(&api, &device).unwrap();
        assert_eq!(
            transport.endpoint,
            "https://attendance.example.org/api/attendance"
        );
    }
}
