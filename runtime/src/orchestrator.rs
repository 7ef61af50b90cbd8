//! Matching orchestrator: first-fit driver matching for one ride request.
//!
//! # Algorithm
//!
//! ```text
//! lookup ──► none ────────────────────────────► NoDriverAvailable   (handled)
//!   │  └───► transport / server error ────────► LookupFailed        (retry)
//!   │  └───► invalid driver payload ──────────► InvalidDriver       (handled)
//!   ▼
//! assign ──► non-2xx ─────────────────────────► AssignmentRejected  (handled)
//!   │  └───► transport error ─────────────────► AssignmentUnreachable (retry)
//!   ▼
//! mark ON_TRIP (best effort, retried in-process) ► Matched          (handled)
//! ```
//!
//! A failed status update never unwinds the assignment. A rejected assignment
//! is not retried either, which is also what makes a redelivered duplicate
//! harmless: the rides service refuses to match an already matched ride and
//! the duplicate settles as handled.

use crate::retry::{RetryPolicy, retry_with_predicate};
use ride_matching_core::environment::{DriverLookup, DriverStatusUpdate, RideAssignment};
use ride_matching_core::error::{AssignmentError, LookupError, StatusUpdateError};
use ride_matching_core::event::RideRequestedEvent;
use ride_matching_core::types::DriverId;
use std::sync::Arc;

/// What the event consumer should do with the delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Processing finished; acknowledge
    Handled,
    /// Processing may succeed later; put the message back
    Retryable,
    /// Not ours or not usable; acknowledge and drop
    Discarded,
}

impl Disposition {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::Retryable => "retryable",
            Self::Discarded => "discarded",
        }
    }
}

/// Detailed result of matching one ride request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Driver assigned. `driver_marked_on_trip` is false when the best-effort
    /// status update failed and was swallowed.
    Matched {
        /// Assigned driver
        driver_id: DriverId,
        /// Whether the driver was moved to `ON_TRIP`
        driver_marked_on_trip: bool,
    },
    /// Nobody available; the ride stays `REQUESTED`
    NoDriverAvailable,
    /// The drivers service answered `200` with something that is not a driver
    InvalidDriver {
        /// Decoder message
        reason: String,
    },
    /// The rides service refused the assignment
    AssignmentRejected {
        /// Driver that was offered
        driver_id: DriverId,
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },
    /// The drivers service could not be asked
    LookupFailed {
        /// Underlying failure
        error: LookupError,
    },
    /// The rides service could not be reached to assign the driver
    AssignmentUnreachable {
        /// Driver that was offered
        driver_id: DriverId,
        /// Transport failure
        reason: String,
    },
}

impl MatchOutcome {
    /// Collapse the outcome into the broker decision.
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::Matched { .. }
            | Self::NoDriverAvailable
            | Self::InvalidDriver { .. }
            | Self::AssignmentRejected { .. } => Disposition::Handled,
            Self::LookupFailed { .. } | Self::AssignmentUnreachable { .. } => {
                Disposition::Retryable
            },
        }
    }

    /// Metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::NoDriverAvailable => "no_driver_available",
            Self::InvalidDriver { .. } => "invalid_driver",
            Self::AssignmentRejected { .. } => "assignment_rejected",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::AssignmentUnreachable { .. } => "assignment_unreachable",
        }
    }
}

/// The collaborators the orchestrator sequences.
#[derive(Clone)]
pub struct MatchingEnvironment {
    /// Finds available drivers
    pub drivers: Arc<dyn DriverLookup>,
    /// Binds drivers to rides
    pub rides: Arc<dyn RideAssignment>,
    /// Moves drivers to `ON_TRIP`
    pub driver_status: Arc<dyn DriverStatusUpdate>,
}

/// Sequences lookup, assignment and status update for each ride request.
#[derive(Clone)]
pub struct MatchingOrchestrator {
    env: MatchingEnvironment,
    status_retry: RetryPolicy,
}

impl MatchingOrchestrator {
    /// Create an orchestrator that does not retry the status update.
    #[must_use]
    pub fn new(env: MatchingEnvironment) -> Self {
        Self {
            env,
            status_retry: RetryPolicy::no_retry(),
        }
    }

    /// Retry transient status update failures with `policy` before giving up.
    #[must_use]
    pub fn with_status_retry(mut self, policy: RetryPolicy) -> Self {
        self.status_retry = policy;
        self
    }

    /// Try to match `event` to one available driver.
    pub async fn handle(&self, event: &RideRequestedEvent) -> MatchOutcome {
        let ride_id = &event.ride_id;

        let driver = match self.env.drivers.find_available_driver().await {
            Ok(Some(driver)) => driver,
            Ok(None) => {
                tracing::info!(ride_id = %ride_id, "No available drivers for ride");
                return MatchOutcome::NoDriverAvailable;
            },
            Err(LookupError::InvalidDriver(reason)) => {
                tracing::warn!(
                    ride_id = %ride_id,
                    reason = %reason,
                    "Drivers service returned an invalid driver object"
                );
                return MatchOutcome::InvalidDriver { reason };
            },
            Err(error) => {
                tracing::error!(
                    ride_id = %ride_id,
                    error = %error,
                    "Failed to contact drivers service, event will be retried"
                );
                return MatchOutcome::LookupFailed { error };
            },
        };

        let driver_id = driver.driver_id;

        match self.env.rides.assign_driver(ride_id, &driver_id).await {
            Ok(()) => {
                tracing::info!(ride_id = %ride_id, driver_id = %driver_id, "Assigned driver to ride");
            },
            Err(AssignmentError::Rejected { status, body }) => {
                tracing::warn!(
                    ride_id = %ride_id,
                    driver_id = %driver_id,
                    status,
                    body = %body,
                    "Failed to assign ride, leaving it unmatched"
                );
                return MatchOutcome::AssignmentRejected {
                    driver_id,
                    status,
                    body,
                };
            },
            Err(AssignmentError::Transport(reason)) => {
                tracing::error!(
                    ride_id = %ride_id,
                    driver_id = %driver_id,
                    error = %reason,
                    "Failed to contact rides service, event will be retried"
                );
                return MatchOutcome::AssignmentUnreachable { driver_id, reason };
            },
        }

        let driver_marked_on_trip = self.mark_on_trip(&driver_id).await;
        MatchOutcome::Matched {
            driver_id,
            driver_marked_on_trip,
        }
    }

    async fn mark_on_trip(&self, driver_id: &DriverId) -> bool {
        let status_client = Arc::clone(&self.env.driver_status);

        let result = retry_with_predicate(
            &self.status_retry,
            "mark_driver_on_trip",
            || status_client.mark_driver_on_trip(driver_id),
            StatusUpdateError::is_transient,
        )
        .await;

        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(
                    driver_id = %driver_id,
                    error = %error,
                    "Failed to update driver status, driver may still appear AVAILABLE"
                );
                false
            },
        }
    }
}
