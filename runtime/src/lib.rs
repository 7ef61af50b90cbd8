//! # Ride Matching Runtime
//!
//! The moving parts of the matching worker, independent of any concrete
//! broker or HTTP stack.
//!
//! ## Core Components
//!
//! - **[`MatchingOrchestrator`]**: first-fit matching policy, sequencing the
//!   lookup, assignment and status update calls for one ride request
//! - **[`EventConsumer`]**: consumes the queue one delivery at a time and
//!   settles each delivery according to the orchestrator's outcome
//! - **[`RedeliveryPolicy`]**: caps how often a retryable message is requeued
//!   before it is quarantined
//!
//! ## Example
//!
//! ```ignore
//! use ride_matching_runtime::{ConsumerConfig, EventConsumer, MatchingEnvironment, MatchingOrchestrator};
//!
//! let orchestrator = MatchingOrchestrator::new(MatchingEnvironment {
//!     drivers: Arc::new(drivers_client.clone()),
//!     rides: Arc::new(rides_client),
//!     driver_status: Arc::new(drivers_client),
//! });
//!
//! let consumer = EventConsumer::new(bus, orchestrator, Arc::new(SystemClock), ConsumerConfig::default());
//! consumer.run().await?;
//! ```

/// Delivery loop and settlement
pub mod consumer;

/// Prometheus metrics for observability
pub mod metrics;

/// Matching policy
pub mod orchestrator;

/// Redelivery cap
pub mod redelivery;

/// Retry logic with exponential backoff
pub mod retry;

pub use consumer::{ConsumerConfig, EventConsumer, MATCHING_QUEUE, Settlement};
pub use orchestrator::{Disposition, MatchOutcome, MatchingEnvironment, MatchingOrchestrator};
pub use redelivery::RedeliveryPolicy;
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
