//! Event consumer: the long-lived loop that turns deliveries into settlements.
//!
//! Deliveries are processed strictly one at a time. Each one is classified
//! from its body, handed to the [`MatchingOrchestrator`] when it is a ride
//! request, and then settled exactly once:
//!
//! | Disposition | Settlement |
//! |---|---|
//! | Handled / Discarded | ack |
//! | Retryable, under the redelivery cap | back off, then requeue with `x-retry-count + 1` |
//! | Retryable, cap reached | dead-letter, then ack |
//! | requeue or dead-letter failed | broker `nack(requeue = true)` |

use crate::metrics::{
    DEAD_LETTERED, DISPOSITIONS, EVENTS_RECEIVED, EVENT_DURATION, FAILURE_NOTIFICATIONS,
    OUTCOMES, counter, histogram,
};
use crate::orchestrator::{Disposition, MatchOutcome, MatchingOrchestrator};
use crate::redelivery::RedeliveryPolicy;
use futures::StreamExt;
use ride_matching_core::environment::Clock;
use ride_matching_core::event::{
    IncomingEvent, MatchingFailureReason, RIDE_MATCHING_FAILED, RideMatchingFailedEvent,
    RideRequestedEvent, classify,
};
use ride_matching_core::message_bus::{Delivery, MessageBus, MessageBusError};
use std::sync::Arc;
use std::time::Instant;

/// Queue the worker consumes by default.
pub const MATCHING_QUEUE: &str = "matching_queue";

/// Consumer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Queue to consume
    pub queue: String,
    /// Redelivery cap for retryable failures
    pub redelivery: RedeliveryPolicy,
    /// Emit `ride.matching_failed` when a ride is left unmatched
    pub publish_matching_failures: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: MATCHING_QUEUE.to_string(),
            redelivery: RedeliveryPolicy::default(),
            publish_matching_failures: true,
        }
    }
}

/// How a delivery left the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Acknowledged and removed from the queue
    Acked,
    /// Republished with a bumped retry counter, original acknowledged
    Requeued,
    /// Moved to the quarantine queue, original acknowledged
    DeadLettered,
    /// Returned to the broker unchanged via `nack(requeue = true)`
    NackedForRedelivery,
}

impl Settlement {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acked => "acked",
            Self::Requeued => "requeued",
            Self::DeadLettered => "dead_lettered",
            Self::NackedForRedelivery => "nacked",
        }
    }
}

/// The matching worker's consumer loop.
pub struct EventConsumer {
    bus: Arc<dyn MessageBus>,
    orchestrator: MatchingOrchestrator,
    clock: Arc<dyn Clock>,
    config: ConsumerConfig,
}

impl EventConsumer {
    /// Create a consumer.
    #[must_use]
    pub fn new(
        bus: Arc<dyn MessageBus>,
        orchestrator: MatchingOrchestrator,
        clock: Arc<dyn Clock>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            bus,
            orchestrator,
            clock,
            config,
        }
    }

    /// Consume until the subscription ends.
    ///
    /// Only returns on failure: a closed or broken delivery stream means the
    /// broker connection is gone and the process should be restarted.
    ///
    /// # Errors
    ///
    /// Returns the subscription error, the stream error, or
    /// [`MessageBusError::TransportError`] when the stream ends.
    pub async fn run(&self) -> Result<(), MessageBusError> {
        let mut deliveries = self.bus.subscribe(&self.config.queue).await?;
        tracing::info!(queue = %self.config.queue, "Matching worker is consuming");

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery?;
            if let Err(error) = self.process(&delivery).await {
                // The broker redelivers whatever was left unsettled.
                tracing::error!(
                    delivery_tag = delivery.delivery_tag,
                    error = %error,
                    "Failed to settle delivery"
                );
            }
        }

        Err(MessageBusError::TransportError(format!(
            "delivery stream for '{}' closed",
            self.config.queue
        )))
    }

    /// Classify, handle and settle one delivery.
    ///
    /// # Errors
    ///
    /// Returns an error only when every settlement path failed, leaving the
    /// delivery unsettled.
    #[tracing::instrument(
        skip(self, delivery),
        name = "process_delivery",
        fields(delivery_tag = delivery.delivery_tag, retry_count = delivery.retry_count)
    )]
    pub async fn process(&self, delivery: &Delivery) -> Result<Settlement, MessageBusError> {
        let started = Instant::now();
        counter!(EVENTS_RECEIVED).increment(1);

        let settlement = match classify(&delivery.payload) {
            Err(error) => {
                tracing::error!(error = %error, "Failed to decode message body");
                self.settle(delivery, Disposition::Retryable, "malformed payload")
                    .await?
            },
            Ok(IncomingEvent::Ignored { event_type }) => {
                tracing::info!(
                    event_type = event_type.as_deref().unwrap_or("<none>"),
                    "Skipping event of other type"
                );
                self.settle(delivery, Disposition::Discarded, "").await?
            },
            Ok(IncomingEvent::MissingRideId) => {
                tracing::warn!("Received ride.requested without rideId");
                self.settle(delivery, Disposition::Discarded, "").await?
            },
            Ok(IncomingEvent::RideRequested(event)) => {
                tracing::info!(
                    ride_id = %event.ride_id,
                    correlation_id = event.correlation_id().unwrap_or_default(),
                    "Received ride.requested"
                );

                let outcome = self.orchestrator.handle(&event).await;
                counter!(OUTCOMES, "outcome" => outcome.as_str()).increment(1);

                if self.config.publish_matching_failures {
                    self.notify_matching_failure(&event, &outcome).await;
                }

                self.settle(delivery, outcome.disposition(), outcome.as_str())
                    .await?
            },
        };

        histogram!(EVENT_DURATION).record(started.elapsed().as_secs_f64());
        Ok(settlement)
    }

    async fn settle(
        &self,
        delivery: &Delivery,
        disposition: Disposition,
        reason: &str,
    ) -> Result<Settlement, MessageBusError> {
        counter!(DISPOSITIONS, "disposition" => disposition.as_str()).increment(1);

        let settlement = match disposition {
            Disposition::Handled | Disposition::Discarded => {
                self.bus.ack(delivery).await?;
                Settlement::Acked
            },
            Disposition::Retryable if self.config.redelivery.allows_retry(delivery.retry_count) => {
                let delay = self.config.redelivery.delay_before_requeue(delivery.retry_count);
                if !delay.is_zero() {
                    tracing::debug!(delay = ?delay, "Backing off before requeue");
                    tokio::time::sleep(delay).await;
                }

                match self.bus.requeue(delivery).await {
                    Ok(()) => {
                        tracing::info!(
                            next_retry_count = delivery.retry_count + 1,
                            "Requeued delivery for another attempt"
                        );
                        Settlement::Requeued
                    },
                    Err(error) => {
                        tracing::warn!(error = %error, "Requeue failed, returning delivery to broker");
                        self.bus.nack(delivery, true).await?;
                        Settlement::NackedForRedelivery
                    },
                }
            },
            Disposition::Retryable => match self.bus.dead_letter(delivery, reason).await {
                Ok(()) => {
                    counter!(DEAD_LETTERED).increment(1);
                    tracing::error!(
                        reason,
                        max_redeliveries = self.config.redelivery.max_redeliveries,
                        "Redeliveries exhausted, moved message to dead-letter queue"
                    );
                    Settlement::DeadLettered
                },
                Err(error) => {
                    tracing::error!(error = %error, "Dead-lettering failed, returning delivery to broker");
                    self.bus.nack(delivery, true).await?;
                    Settlement::NackedForRedelivery
                },
            },
        };

        Ok(settlement)
    }

    async fn notify_matching_failure(&self, event: &RideRequestedEvent, outcome: &MatchOutcome) {
        let failure = match outcome {
            MatchOutcome::NoDriverAvailable => RideMatchingFailedEvent::new(
                event.ride_id.clone(),
                MatchingFailureReason::NoDriverAvailable,
                event.correlation_id().map(str::to_string),
                self.clock.now(),
            ),
            MatchOutcome::AssignmentRejected {
                driver_id, status, ..
            } => RideMatchingFailedEvent::new(
                event.ride_id.clone(),
                MatchingFailureReason::AssignmentRejected,
                event.correlation_id().map(str::to_string),
                self.clock.now(),
            )
            .with_driver(driver_id.clone())
            .with_status(*status),
            _ => return,
        };

        let published = match failure.to_json() {
            Ok(payload) => self.bus.publish(RIDE_MATCHING_FAILED, &payload).await,
            Err(e) => Err(MessageBusError::PublishFailed {
                routing_key: RIDE_MATCHING_FAILED.to_string(),
                reason: e.to_string(),
            }),
        };

        match published {
            Ok(()) => {
                counter!(FAILURE_NOTIFICATIONS, "result" => "published").increment(1);
                tracing::info!(ride_id = %event.ride_id, "Published ride.matching_failed");
            },
            Err(error) => {
                counter!(FAILURE_NOTIFICATIONS, "result" => "failed").increment(1);
                tracing::warn!(
                    ride_id = %event.ride_id,
                    error = %error,
                    "Failed to publish ride.matching_failed"
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_consumes_matching_queue() {
        let config = ConsumerConfig::default();
        assert_eq!(config.queue, "matching_queue");
        assert_eq!(config.redelivery.max_redeliveries, 5);
        assert!(config.publish_matching_failures);
    }

    #[test]
    fn settlement_labels_are_distinct() {
        let labels = [
            Settlement::Acked,
            Settlement::Requeued,
            Settlement::DeadLettered,
            Settlement::NackedForRedelivery,
        ]
        .map(Settlement::as_str);

        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
