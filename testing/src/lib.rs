//! # Ride Matching Testing
//!
//! Testing utilities for the ride matching worker.
//!
//! This crate provides:
//! - In-memory doubles for every collaborator trait in `ride-matching-core`
//! - An [`InMemoryMessageBus`] that records how each delivery was settled
//! - Builders for ride request payloads
//! - Proptest strategies for events the worker must skip
//!
//! ## Example
//!
//! ```ignore
//! use ride_matching_testing::{InMemoryMessageBus, ScriptedDriverLookup, helpers};
//!
//! #[tokio::test]
//! async fn matches_first_driver() {
//!     let bus = InMemoryMessageBus::new();
//!     let drivers = ScriptedDriverLookup::returning(Ok(Some(helpers::available_driver("d1"))));
//!
//!     let delivery = bus.deliver(helpers::ride_requested_payload("r1"));
//!     consumer.process(&delivery).await?;
//!
//!     assert_eq!(bus.acked(), vec![delivery.delivery_tag]);
//! }
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

pub mod bus;
pub mod helpers;
pub mod mocks;
pub mod properties;
pub mod services;

// Re-export commonly used items
pub use bus::{BusOperation, InMemoryMessageBus};
pub use mocks::{FixedClock, test_clock};
pub use services::{RecordingDriverStatus, RecordingRideAssignment, ScriptedDriverLookup};
