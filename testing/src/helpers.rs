//! Builders for ride events and drivers.

use ride_matching_core::types::{Driver, DriverId, DriverStatus};
use serde_json::{Value, json};

/// A well-formed `ride.requested` body for `ride_id`.
#[must_use]
pub fn ride_requested(ride_id: &str) -> Value {
    json!({
        "type": "ride.requested",
        "rideId": ride_id,
        "riderId": "u1",
        "pickup": {"lat": 1, "lon": 1},
        "dropoff": {"lat": 2, "lon": 2}
    })
}

/// [`ride_requested`] with a correlation id in its metadata.
#[must_use]
pub fn ride_requested_with_correlation(ride_id: &str, correlation_id: &str) -> Value {
    let mut event = ride_requested(ride_id);
    event["metadata"] = json!({
        "correlation_id": correlation_id,
        "timestamp": "2025-01-01T00:00:00Z"
    });
    event
}

/// [`ride_requested`] encoded as a message body.
#[must_use]
pub fn ride_requested_payload(ride_id: &str) -> Vec<u8> {
    to_payload(&ride_requested(ride_id))
}

/// Encode any JSON value as a message body.
#[must_use]
pub fn to_payload(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// An `AVAILABLE` driver with only an id.
#[must_use]
pub fn available_driver(driver_id: &str) -> Driver {
    Driver {
        driver_id: DriverId::new(driver_id),
        status: DriverStatus::Available,
        name: None,
        car_model: None,
        location: None,
    }
}
