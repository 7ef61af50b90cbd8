//! Ride events exchanged over the broker.
//!
//! The rides service publishes [`RideRequestedEvent`] onto the `ride_events`
//! exchange. The worker classifies every delivery with [`classify`] before any
//! network call is made, so that foreign event types and malformed payloads are
//! settled without touching the collaborator services.
//!
//! # Example
//!
//! ```
//! use ride_matching_core::event::{classify, IncomingEvent};
//!
//! let payload = br#"{
//!     "type": "ride.requested",
//!     "rideId": "r1",
//!     "riderId": "u1",
//!     "pickup": {"lat": 1.0, "lon": 1.0},
//!     "dropoff": {"lat": 2.0, "lon": 2.0}
//! }"#;
//!
//! match classify(payload)? {
//!     IncomingEvent::RideRequested(event) => assert_eq!(event.ride_id.as_str(), "r1"),
//!     other => panic!("unexpected classification: {other:?}"),
//! }
//! # Ok::<(), ride_matching_core::event::DecodeError>(())
//! ```

use crate::types::{DriverId, Location, RideId};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event type (and routing key) of a ride request.
pub const RIDE_REQUESTED: &str = "ride.requested";

/// Event type (and routing key) of the compensating event emitted when a ride
/// could not be matched.
pub const RIDE_MATCHING_FAILED: &str = "ride.matching_failed";

/// Tracing metadata attached to events by the publisher.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Correlation identifier shared by every event of one ride request
    #[serde(default, alias = "correlation_id", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// When the event was produced; offset-less ISO-8601 is read as UTC
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A rider asked for a ride; the worker must find a driver for it.
///
/// Only `type` and `rideId` are required. Matching reads nothing else, so
/// every other field that is absent or does not decode is left as `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequestedEvent {
    /// Always [`RIDE_REQUESTED`]
    #[serde(rename = "type")]
    pub event_type: String,
    /// Ride awaiting a driver
    pub ride_id: RideId,
    /// Rider who requested it
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rider_id: Option<String>,
    /// Pickup point
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Location>,
    /// Destination
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub dropoff: Option<Location>,
    /// Publisher metadata, if any
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl RideRequestedEvent {
    /// A request carrying nothing but its ride id.
    #[must_use]
    pub fn new(ride_id: RideId) -> Self {
        Self {
            event_type: RIDE_REQUESTED.to_string(),
            ride_id,
            rider_id: None,
            pickup: None,
            dropoff: None,
            metadata: None,
        }
    }

    /// Correlation identifier of the request, when the publisher supplied one.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.correlation_id.as_deref())
    }
}

/// Decode an optional field, mapping a value of the wrong shape to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = lenient::<D, String>(deserializer)?;
    Ok(raw.and_then(|raw| parse_timestamp(&raw)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            raw.parse::<NaiveDateTime>()
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Why a ride could not be matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingFailureReason {
    /// The drivers service had nobody available
    NoDriverAvailable,
    /// The rides service refused the assignment
    AssignmentRejected,
}

/// Compensating event published when a ride request was settled without a match.
///
/// The ride stays `REQUESTED` in the rides service; this event makes the gap
/// visible to operators and to anything that wants to re-request the ride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideMatchingFailedEvent {
    /// Always [`RIDE_MATCHING_FAILED`]
    #[serde(rename = "type")]
    pub event_type: String,
    /// Ride left unmatched
    pub ride_id: RideId,
    /// Driver whose assignment was refused, if one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    /// Failure classification
    pub reason: MatchingFailureReason,
    /// HTTP status returned by the rides service on rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Correlation carried over from the triggering request
    pub metadata: EventMetadata,
}

impl RideMatchingFailedEvent {
    /// Create a failure event for `ride_id`.
    #[must_use]
    pub fn new(
        ride_id: RideId,
        reason: MatchingFailureReason,
        correlation_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: RIDE_MATCHING_FAILED.to_string(),
            ride_id,
            driver_id: None,
            reason,
            status: None,
            metadata: EventMetadata {
                correlation_id,
                timestamp: Some(timestamp),
            },
        }
    }

    /// Attach the driver that was refused.
    #[must_use]
    pub fn with_driver(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    /// Attach the HTTP status of the rejection.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Encode as a JSON message body.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// The payload could not be read as JSON at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Body is not valid UTF-8 JSON
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),
}

/// How a delivery should be treated, decided from its body alone.
#[derive(Clone, Debug, PartialEq)]
pub enum IncomingEvent {
    /// A well-formed ride request to be matched
    RideRequested(RideRequestedEvent),
    /// Some other event type shared the queue; not an error
    Ignored {
        /// The `type` field, if there was one
        event_type: Option<String>,
    },
    /// A ride request without a usable `rideId`
    MissingRideId,
}

/// Classify a raw message body.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] when the body is not UTF-8 JSON. A
/// foreign `type` or a missing `rideId` is expressed as an [`IncomingEvent`]
/// variant because it is not worth retrying; any other ride request is
/// handed on for matching.
pub fn classify(payload: &[u8]) -> Result<IncomingEvent, DecodeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let event_type = value.get("type").and_then(Value::as_str);
    if event_type != Some(RIDE_REQUESTED) {
        return Ok(IncomingEvent::Ignored {
            event_type: event_type.map(str::to_string),
        });
    }

    let ride_id = match value.get("rideId").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => RideId::new(id),
        _ => return Ok(IncomingEvent::MissingRideId),
    };

    let event = serde_json::from_value::<RideRequestedEvent>(value)
        .unwrap_or_else(|_| RideRequestedEvent::new(ride_id));
    Ok(IncomingEvent::RideRequested(event))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn request_json() -> Value {
        json!({
            "type": "ride.requested",
            "rideId": "r1",
            "riderId": "u1",
            "pickup": {"lat": 1, "lon": 1},
            "dropoff": {"lat": 2, "lon": 2, "address": "Main St 2"},
            "metadata": {
                "correlationId": "c-1",
                "timestamp": "2025-01-01T12:00:00.123456Z"
            }
        })
    }

    fn bytes(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn classifies_ride_request() {
        let IncomingEvent::RideRequested(event) = classify(&bytes(&request_json())).unwrap() else {
            panic!("expected ride request");
        };

        assert_eq!(event.ride_id, RideId::new("r1"));
        assert_eq!(event.rider_id.as_deref(), Some("u1"));
        assert_eq!(
            event.dropoff.as_ref().and_then(|d| d.address.as_deref()),
            Some("Main St 2")
        );
        assert_eq!(event.correlation_id(), Some("c-1"));
    }

    #[test]
    fn accepts_snake_case_correlation_id() {
        let mut value = request_json();
        value["metadata"] = json!({"correlation_id": "c-2", "timestamp": "2025-01-01T00:00:00Z"});

        let IncomingEvent::RideRequested(event) = classify(&bytes(&value)).unwrap() else {
            panic!("expected ride request");
        };
        assert_eq!(event.correlation_id(), Some("c-2"));
    }

    #[test]
    fn metadata_is_optional() {
        let mut value = request_json();
        value.as_object_mut().unwrap().remove("metadata");

        let IncomingEvent::RideRequested(event) = classify(&bytes(&value)).unwrap() else {
            panic!("expected ride request");
        };
        assert_eq!(event.correlation_id(), None);
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            classify(b"{not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            classify(&[0xff, 0xfe, 0x00]),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn other_event_types_are_ignored() {
        let event = classify(br#"{"type":"ride.completed","rideId":"r1"}"#).unwrap();
        assert_eq!(
            event,
            IncomingEvent::Ignored {
                event_type: Some("ride.completed".to_string())
            }
        );

        let event = classify(br#"{"rideId":"r1"}"#).unwrap();
        assert_eq!(event, IncomingEvent::Ignored { event_type: None });
    }

    #[test]
    fn missing_or_empty_ride_id_is_reported() {
        for body in [
            json!({"type": "ride.requested"}),
            json!({"type": "ride.requested", "rideId": ""}),
            json!({"type": "ride.requested", "rideId": null}),
            json!({"type": "ride.requested", "rideId": 42}),
        ] {
            assert_eq!(classify(&bytes(&body)).unwrap(), IncomingEvent::MissingRideId);
        }
    }

    #[test]
    fn offset_less_timestamp_is_read_as_utc() {
        let mut value = request_json();
        value["metadata"] = json!({"correlationId": "c", "timestamp": "2025-01-01T12:00:00"});

        let IncomingEvent::RideRequested(event) = classify(&bytes(&value)).unwrap() else {
            panic!("expected ride request");
        };
        let metadata = event.metadata.unwrap();
        assert_eq!(metadata.correlation_id.as_deref(), Some("c"));
        assert_eq!(
            metadata.timestamp.unwrap().to_rfc3339(),
            "2025-01-01T12:00:00+00:00"
        );
    }

    #[test]
    fn unreadable_timestamp_keeps_correlation() {
        let mut value = request_json();
        value["metadata"] = json!({"correlationId": "c", "timestamp": "yesterday"});

        let IncomingEvent::RideRequested(event) = classify(&bytes(&value)).unwrap() else {
            panic!("expected ride request");
        };
        assert_eq!(event.correlation_id(), Some("c"));
        assert_eq!(event.metadata.unwrap().timestamp, None);
    }

    #[test]
    fn fields_unused_by_matching_do_not_reject_request() {
        for body in [
            json!({"type": "ride.requested", "rideId": "r1"}),
            json!({"type": "ride.requested", "rideId": "r1", "pickup": {"lat": 1, "lon": 1}}),
            json!({
                "type": "ride.requested",
                "rideId": "r1",
                "riderId": 7,
                "pickup": "downtown",
                "dropoff": {"lat": "north"},
                "metadata": "none"
            }),
        ] {
            let IncomingEvent::RideRequested(event) = classify(&bytes(&body)).unwrap() else {
                panic!("expected ride request for {body}");
            };
            assert_eq!(event.ride_id, RideId::new("r1"));
            assert_eq!(event.rider_id, None);
            assert_eq!(event.dropoff, None);
            assert_eq!(event.correlation_id(), None);
        }
    }

    #[test]
    fn failure_event_shape() {
        let timestamp = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = RideMatchingFailedEvent::new(
            RideId::new("r1"),
            MatchingFailureReason::AssignmentRejected,
            Some("c-1".to_string()),
            timestamp,
        )
        .with_driver(DriverId::new("d1"))
        .with_status(409);

        let value: Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ride.matching_failed",
                "rideId": "r1",
                "driverId": "d1",
                "reason": "assignment_rejected",
                "status": 409,
                "metadata": {
                    "correlationId": "c-1",
                    "timestamp": "2025-01-01T00:00:00Z"
                }
            })
        );
    }

    proptest! {
        #[test]
        fn non_request_types_are_always_ignored(event_type in "[a-z._]{0,24}") {
            prop_assume!(event_type != RIDE_REQUESTED);
            let body = bytes(&json!({"type": event_type, "rideId": "r1"}));
            let ignored = matches!(classify(&body), Ok(IncomingEvent::Ignored { .. }));
            prop_assert!(ignored);
        }
    }
}
