//! Proptest strategies for message bodies the worker must skip without
//! calling any collaborator.

use proptest::prelude::*;
use serde_json::{Value, json};

/// Any `type` value other than `ride.requested`, including a missing one.
pub fn foreign_event_type() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("ride.matched".to_string())),
        Just(Some("ride.completed".to_string())),
        Just(Some("RIDE.REQUESTED".to_string())),
        "[a-z_.]{0,24}".prop_filter_map("must not be ride.requested", |t| {
            (t != "ride.requested").then_some(Some(t))
        }),
    ]
}

/// Event bodies whose type is not `ride.requested`; otherwise well formed.
pub fn foreign_event() -> impl Strategy<Value = Value> {
    (foreign_event_type(), "[a-z0-9]{1,12}").prop_map(|(event_type, ride_id)| {
        let mut event = json!({
            "rideId": ride_id,
            "riderId": "u1",
            "pickup": {"lat": 1, "lon": 1},
            "dropoff": {"lat": 2, "lon": 2}
        });
        if let Some(event_type) = event_type {
            event["type"] = Value::String(event_type);
        }
        event
    })
}

/// `ride.requested` bodies whose `rideId` is absent, empty or not a string.
pub fn ride_request_without_ride_id() -> impl Strategy<Value = Value> {
    let ride_id = prop_oneof![
        Just(None),
        Just(Some(json!(""))),
        Just(Some(Value::Null)),
        any::<i64>().prop_map(|n| Some(json!(n))),
        Just(Some(json!(["r1"]))),
    ];

    ride_id.prop_map(|ride_id| {
        let mut event = json!({
            "type": "ride.requested",
            "riderId": "u1",
            "pickup": {"lat": 1, "lon": 1},
            "dropoff": {"lat": 2, "lon": 2}
        });
        if let Some(ride_id) = ride_id {
            event["rideId"] = ride_id;
        }
        event
    })
}
