//! Scripted and recording doubles for the drivers and rides services.

use ride_matching_core::environment::{
    BoxFuture, DriverLookup, DriverStatusUpdate, RideAssignment,
};
use ride_matching_core::error::{AssignmentError, LookupError, StatusUpdateError};
use ride_matching_core::types::{Driver, DriverId, RideId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type LookupResult = Result<Option<Driver>, LookupError>;

/// [`DriverLookup`] that answers from a script.
///
/// Queued answers are consumed first; after that every call gets the default.
#[derive(Clone)]
pub struct ScriptedDriverLookup {
    queued: Arc<Mutex<VecDeque<LookupResult>>>,
    default: LookupResult,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedDriverLookup {
    /// Answer every call with `result`.
    #[must_use]
    pub fn returning(result: LookupResult) -> Self {
        Self {
            queued: Arc::new(Mutex::new(VecDeque::new())),
            default: result,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Nobody is ever available.
    #[must_use]
    pub fn empty() -> Self {
        Self::returning(Ok(None))
    }

    /// Answer the next call with `result` before falling back to the default.
    #[must_use]
    pub fn then(self, result: LookupResult) -> Self {
        self.queued.lock().unwrap().push_back(result);
        self
    }

    /// Number of lookups made.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl DriverLookup for ScriptedDriverLookup {
    fn find_available_driver(&self) -> BoxFuture<'_, LookupResult> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            let queued = self.queued.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| self.default.clone())
        })
    }
}

#[derive(Clone, Debug)]
enum AssignBehavior {
    /// Accept unless the ride is already matched, like the rides service
    Accept,
    Reject { status: u16, body: String },
    Unreachable(String),
}

/// [`RideAssignment`] that records every call.
///
/// By default it behaves like the rides service: the first assignment of a
/// ride succeeds and any later one is refused with `409`.
#[derive(Clone)]
pub struct RecordingRideAssignment {
    behavior: AssignBehavior,
    calls: Arc<Mutex<Vec<(RideId, DriverId)>>>,
    matched: Arc<Mutex<HashMap<RideId, DriverId>>>,
}

impl RecordingRideAssignment {
    /// Accept first assignments, refuse re-assignment of a matched ride.
    #[must_use]
    pub fn accepting() -> Self {
        Self::with_behavior(AssignBehavior::Accept)
    }

    /// Refuse every assignment with `status`.
    #[must_use]
    pub fn rejecting(status: u16, body: impl Into<String>) -> Self {
        Self::with_behavior(AssignBehavior::Reject {
            status,
            body: body.into(),
        })
    }

    /// Fail every assignment at the transport level.
    #[must_use]
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::with_behavior(AssignBehavior::Unreachable(reason.into()))
    }

    fn with_behavior(behavior: AssignBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            matched: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Every `(ride, driver)` pair the worker tried to assign, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(RideId, DriverId)> {
        self.calls.lock().unwrap().clone()
    }

    /// The driver a ride ended up matched to.
    #[must_use]
    pub fn matched_driver(&self, ride_id: &RideId) -> Option<DriverId> {
        self.matched.lock().unwrap().get(ride_id).cloned()
    }
}

impl RideAssignment for RecordingRideAssignment {
    fn assign_driver<'a>(
        &'a self,
        ride_id: &'a RideId,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), AssignmentError>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((ride_id.clone(), driver_id.clone()));

            match &self.behavior {
                AssignBehavior::Accept => {
                    let mut matched = self.matched.lock().unwrap();
                    if matched.contains_key(ride_id) {
                        return Err(AssignmentError::Rejected {
                            status: 409,
                            body: format!("ride {ride_id} is already MATCHED"),
                        });
                    }
                    matched.insert(ride_id.clone(), driver_id.clone());
                    Ok(())
                },
                AssignBehavior::Reject { status, body } => Err(AssignmentError::Rejected {
                    status: *status,
                    body: body.clone(),
                }),
                AssignBehavior::Unreachable(reason) => {
                    Err(AssignmentError::Transport(reason.clone()))
                },
            }
        })
    }
}

/// [`DriverStatusUpdate`] that records every call and can fail on script.
#[derive(Clone, Default)]
pub struct RecordingDriverStatus {
    failures: Arc<Mutex<VecDeque<StatusUpdateError>>>,
    calls: Arc<Mutex<Vec<DriverId>>>,
}

impl RecordingDriverStatus {
    /// Succeed on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls with `error`, then succeed.
    #[must_use]
    pub fn failing(self, times: usize, error: &StatusUpdateError) -> Self {
        self.failures
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(error.clone(), times));
        self
    }

    /// Drivers the worker tried to mark `ON_TRIP`, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DriverId> {
        self.calls.lock().unwrap().clone()
    }
}

impl DriverStatusUpdate for RecordingDriverStatus {
    fn mark_driver_on_trip<'a>(
        &'a self,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), StatusUpdateError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(driver_id.clone());
            let failure = self.failures.lock().unwrap().pop_front();
            failure.map_or(Ok(()), Err)
        })
    }
}
