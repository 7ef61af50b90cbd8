//! # Ride Matching Core
//!
//! Domain types and service contracts for the ride-matching worker.
//!
//! The worker is a stateless relay: it consumes `ride.requested` events, asks
//! the drivers service for an available driver, binds that driver to the ride
//! through the rides service, and finally moves the driver to `ON_TRIP`. All
//! durable truth lives in those two services.
//!
//! This crate holds no I/O. It defines:
//!
//! - [`types`]: rides, drivers and locations as seen over HTTP
//! - [`event`]: broker payloads and [`event::classify`]
//! - [`environment`]: the collaborator traits the orchestrator depends on
//! - [`error`]: the failure taxonomy of those collaborators
//! - [`message_bus`]: the broker abstraction used by the event consumer

pub mod environment;
pub mod error;
pub mod event;
pub mod message_bus;
pub mod types;

pub use environment::{BoxFuture, Clock, DriverLookup, DriverStatusUpdate, RideAssignment, SystemClock};
pub use error::{AssignmentError, LookupError, StatusUpdateError};
pub use event::{IncomingEvent, RideMatchingFailedEvent, RideRequestedEvent};
pub use message_bus::{Delivery, DeliveryStream, MessageBus, MessageBusError};
pub use types::{Driver, DriverId, DriverStatus, Location, Ride, RideId, RideStatus};
