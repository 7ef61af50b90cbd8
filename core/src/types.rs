//! Domain types as seen through the HTTP boundary of the drivers and rides services.
//!
//! The worker never owns any of this state. Drivers and rides live in their
//! respective services; these types only describe what crosses the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a ride, assigned by the rides service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(String);

impl RideId {
    /// Wrap a raw ride identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a driver, assigned by the drivers service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(String);

impl DriverId {
    /// Wrap a raw driver identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point on the map, optionally with a human-readable address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Street address, if the client supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Driver availability as tracked by the drivers service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    /// Not accepting rides
    Offline,
    /// Free to be matched
    Available,
    /// Currently serving a ride
    OnTrip,
}

impl DriverStatus {
    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::Available => "AVAILABLE",
            Self::OnTrip => "ON_TRIP",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A driver record returned by the drivers service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Driver identifier
    pub driver_id: DriverId,
    /// Current availability
    pub status: DriverStatus,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Vehicle model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub car_model: Option<String>,
    /// Last reported position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Ride lifecycle as tracked by the rides service.
///
/// Only the states the worker reasons about are modelled; anything else the
/// service reports is preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RideStatus {
    /// Waiting for a driver
    Requested,
    /// A driver has been assigned
    Matched,
    /// Any other status string reported by the rides service
    Other(String),
}

impl From<String> for RideStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "REQUESTED" => Self::Requested,
            "MATCHED" => Self::Matched,
            _ => Self::Other(value),
        }
    }
}

impl From<RideStatus> for String {
    fn from(value: RideStatus) -> Self {
        match value {
            RideStatus::Requested => "REQUESTED".to_string(),
            RideStatus::Matched => "MATCHED".to_string(),
            RideStatus::Other(other) => other,
        }
    }
}

/// A ride record returned by the rides service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    /// Ride identifier
    pub ride_id: RideId,
    /// Current lifecycle state
    pub status: RideStatus,
    /// Assigned driver, once matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
}
