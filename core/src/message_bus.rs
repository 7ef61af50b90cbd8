//! Message bus abstraction for the ride event queue.
//!
//! This module provides the [`MessageBus`] trait the event consumer uses to
//! receive ride events and settle each delivery. Settling is explicit: nothing
//! leaves the queue until the consumer acknowledges it, moves it back with a
//! bumped retry counter, or quarantines it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ride.requested   ┌────────────────┐
//! │ rides service│ ────────────────► │  ride_events   │ (topic, durable)
//! └──────────────┘                   └───────┬────────┘
//!                                            │ ride.requested
//!                                            ▼
//!                                    ┌────────────────┐
//!                         requeue ┌─►│ matching_queue │ (durable)
//!                  (retry + 1)    │  └───────┬────────┘
//!                                 │          │ manual ack
//!                                 │          ▼
//!                                 │  ┌────────────────┐
//!                                 └──┤ matching worker│
//!                                    └───────┬────────┘
//!                                            │ retries exhausted
//!                                            ▼
//!                                    ┌────────────────────┐
//!                                    │ matching_queue.dlq │ (quarantine)
//!                                    └────────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! - **At-least-once**: a delivery may arrive more than once; the consumer
//!   must tolerate duplicates.
//! - **Bounded redelivery**: [`MessageBus::requeue`] increments the
//!   [`RETRY_COUNT_HEADER`] so poison messages can be capped and moved to the
//!   quarantine destination with [`MessageBus::dead_letter`].
//!
//! # Implementations
//!
//! - `AmqpMessageBus` in `ride-matching-amqp` - RabbitMQ, for production
//! - `InMemoryMessageBus` in `ride-matching-testing` - for tests

use crate::environment::BoxFuture;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Header carrying how many times a message has been put back on the queue.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Header carrying why a message was quarantined.
pub const DEAD_LETTER_REASON_HEADER: &str = "x-dead-letter-reason";

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageBusError {
    /// Failed to start consuming from a queue
    #[error("Subscription failed for queue '{queue}': {reason}")]
    SubscriptionFailed {
        /// The queue that failed
        queue: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to publish a message
    #[error("Publish failed for routing key '{routing_key}': {reason}")]
    PublishFailed {
        /// Routing key of the failed publish
        routing_key: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to acknowledge, reject or requeue a delivery
    #[error("Settlement of delivery {delivery_tag} failed: {reason}")]
    SettlementFailed {
        /// Broker delivery tag
        delivery_tag: u64,
        /// The reason for failure
        reason: String,
    },

    /// The connection or channel was lost while consuming
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// A message checked out from the queue and awaiting settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned tag, unique per channel
    pub delivery_tag: u64,
    /// Routing key the message was published with
    pub routing_key: String,
    /// Raw message body
    pub payload: Vec<u8>,
    /// Value of [`RETRY_COUNT_HEADER`], zero when absent
    pub retry_count: u32,
    /// Whether the broker flagged this as a redelivery
    pub redelivered: bool,
}

impl Delivery {
    /// Create a first-time delivery.
    #[must_use]
    pub fn new(delivery_tag: u64, routing_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            delivery_tag,
            routing_key: routing_key.into(),
            payload,
            retry_count: 0,
            redelivered: false,
        }
    }

    /// Set the retry counter.
    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Stream of deliveries from a subscription.
///
/// The stream ends, or yields an error, when the broker connection is lost.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessageBusError>> + Send>>;

/// Trait for message bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit boxed futures instead of `async fn` so it can be
/// used as `Arc<dyn MessageBus>`.
pub trait MessageBus: Send + Sync {
    /// Start consuming `queue` with manual acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SubscriptionFailed`] if the consumer cannot be created.
    fn subscribe(&self, queue: &str) -> BoxFuture<'_, Result<DeliveryStream, MessageBusError>>;

    /// Remove a processed delivery from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SettlementFailed`] if the broker rejects the ack.
    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<(), MessageBusError>>;

    /// Put a delivery back on its queue with [`RETRY_COUNT_HEADER`] incremented.
    ///
    /// The copy must be confirmed by the broker before the original is
    /// acknowledged, so a failure leaves the original checked out.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] or
    /// [`MessageBusError::SettlementFailed`] when either half fails.
    fn requeue<'a>(&'a self, delivery: &'a Delivery)
    -> BoxFuture<'a, Result<(), MessageBusError>>;

    /// Broker-level negative acknowledgment.
    ///
    /// With `requeue = true` the broker redelivers the message unchanged, so the
    /// retry counter does not move. Used as the fallback when [`Self::requeue`]
    /// cannot publish.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SettlementFailed`] if the broker rejects the nack.
    fn nack<'a>(
        &'a self,
        delivery: &'a Delivery,
        requeue: bool,
    ) -> BoxFuture<'a, Result<(), MessageBusError>>;

    /// Move a delivery to the quarantine destination and acknowledge the original.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] or
    /// [`MessageBusError::SettlementFailed`] when either half fails.
    fn dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), MessageBusError>>;

    /// Publish a persistent JSON message to the events exchange and wait for
    /// the broker to confirm it.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] if the publish is not confirmed.
    fn publish<'a>(
        &'a self,
        routing_key: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), MessageBusError>>;
}
