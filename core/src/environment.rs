//! Dependencies of the matching orchestrator.
//!
//! Every collaborator the orchestrator talks to is a trait here, so production
//! code can plug in HTTP clients while tests plug in scripted doubles.
//!
//! The traits return `Pin<Box<dyn Future>>` instead of using `async fn` so they
//! stay object safe and can be shared as `Arc<dyn DriverLookup>`.

use crate::error::{AssignmentError, LookupError, StatusUpdateError};
use crate::types::{Driver, DriverId, RideId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Finds a driver that can take a ride.
pub trait DriverLookup: Send + Sync {
    /// Ask for one available driver.
    ///
    /// `Ok(None)` means nobody is available right now, which is a valid answer
    /// and not an error. Implementations must not retry internally.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] on transport failures and unexpected statuses.
    fn find_available_driver(&self) -> BoxFuture<'_, Result<Option<Driver>, LookupError>>;
}

/// Binds drivers to rides.
pub trait RideAssignment: Send + Sync {
    /// Assign `driver_id` to `ride_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Rejected`] for any non-2xx answer, which
    /// includes the rides service refusing an already matched ride.
    fn assign_driver<'a>(
        &'a self,
        ride_id: &'a RideId,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), AssignmentError>>;
}

/// Moves drivers between availability states.
pub trait DriverStatusUpdate: Send + Sync {
    /// Mark `driver_id` as `ON_TRIP`.
    ///
    /// # Errors
    ///
    /// Returns a [`StatusUpdateError`] when the transition could not be applied.
    fn mark_driver_on_trip<'a>(
        &'a self,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), StatusUpdateError>>;
}

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
