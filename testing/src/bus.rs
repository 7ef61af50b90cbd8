//! In-memory message bus.
//!
//! Plays the broker for consumer tests: deliveries are fed through a channel
//! and every settlement is recorded in order, so tests can assert exactly how
//! a message left the consumer.

use ride_matching_core::environment::BoxFuture;
use ride_matching_core::message_bus::{Delivery, DeliveryStream, MessageBus, MessageBusError};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A recorded call on the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOperation {
    /// `ack(tag)`
    Ack(u64),
    /// `requeue(tag)`, producing a copy with `retry_count`
    Requeue {
        /// Tag of the original
        delivery_tag: u64,
        /// Counter carried by the republished copy
        retry_count: u32,
    },
    /// `nack(tag, requeue)`
    Nack {
        /// Tag of the delivery
        delivery_tag: u64,
        /// Whether the broker should redeliver it
        requeue: bool,
    },
    /// `dead_letter(tag, reason)`
    DeadLetter {
        /// Tag of the delivery
        delivery_tag: u64,
        /// Quarantine reason header
        reason: String,
    },
    /// `publish(routing_key, payload)`
    Publish {
        /// Routing key on the events exchange
        routing_key: String,
        /// Message body
        payload: Vec<u8>,
    },
}

#[derive(Default)]
struct BusState {
    operations: Vec<BusOperation>,
    next_tag: u64,
    fail_requeue: bool,
    fail_dead_letter: bool,
    fail_publish: bool,
}

/// In-memory [`MessageBus`] for tests.
///
/// # Example
///
/// ```
/// use ride_matching_testing::{BusOperation, InMemoryMessageBus};
/// use ride_matching_core::message_bus::MessageBus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryMessageBus::new();
/// let delivery = bus.deliver(b"{}".to_vec());
///
/// bus.ack(&delivery).await?;
/// assert_eq!(bus.operations(), vec![BusOperation::Ack(delivery.delivery_tag)]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryMessageBus {
    state: Arc<Mutex<BusState>>,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Delivery>>>>,
    receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>>,
}

impl InMemoryMessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    /// Enqueue a first-time delivery of `payload` and return it.
    pub fn deliver(&self, payload: Vec<u8>) -> Delivery {
        self.deliver_with_retry_count(payload, 0)
    }

    /// Enqueue a delivery that has already been requeued `retry_count` times.
    pub fn deliver_with_retry_count(&self, payload: Vec<u8>, retry_count: u32) -> Delivery {
        let tag = self.next_tag();
        let delivery = Delivery::new(tag, "ride.requested", payload).with_retry_count(retry_count);
        self.enqueue(delivery.clone());
        delivery
    }

    /// End the subscription once the queued deliveries are drained, as a lost
    /// broker connection would.
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    /// Make `requeue` fail from now on.
    pub fn fail_requeues(&self) {
        self.state.lock().unwrap().fail_requeue = true;
    }

    /// Make `dead_letter` fail from now on.
    pub fn fail_dead_letters(&self) {
        self.state.lock().unwrap().fail_dead_letter = true;
    }

    /// Make `publish` fail from now on.
    pub fn fail_publishes(&self) {
        self.state.lock().unwrap().fail_publish = true;
    }

    /// Every call, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<BusOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Tags of acknowledged deliveries.
    #[must_use]
    pub fn acked(&self) -> Vec<u64> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                BusOperation::Ack(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    /// Messages published to the events exchange, as `(routing_key, payload)`.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                BusOperation::Publish {
                    routing_key,
                    payload,
                } => Some((routing_key, payload)),
                _ => None,
            })
            .collect()
    }

    /// Published messages decoded as JSON.
    #[must_use]
    pub fn published_json(&self) -> Vec<serde_json::Value> {
        self.published()
            .iter()
            .map(|(_, payload)| serde_json::from_slice(payload).unwrap())
            .collect()
    }

    fn next_tag(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_tag += 1;
        state.next_tag
    }

    fn enqueue(&self, delivery: Delivery) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.send(delivery);
        }
    }

    fn record(&self, operation: BusOperation) {
        self.state.lock().unwrap().operations.push(operation);
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for InMemoryMessageBus {
    fn subscribe(&self, queue: &str) -> BoxFuture<'_, Result<DeliveryStream, MessageBusError>> {
        let queue = queue.to_string();
        Box::pin(async move {
            let mut receiver =
                self.receiver
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or(MessageBusError::SubscriptionFailed {
                        queue,
                        reason: "already subscribed".to_string(),
                    })?;

            let stream: DeliveryStream = Box::pin(async_stream::stream! {
                while let Some(delivery) = receiver.recv().await {
                    yield Ok(delivery);
                }
            });
            Ok(stream)
        })
    }

    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<(), MessageBusError>> {
        Box::pin(async move {
            self.record(BusOperation::Ack(delivery.delivery_tag));
            Ok(())
        })
    }

    fn requeue<'a>(
        &'a self,
        delivery: &'a Delivery,
    ) -> BoxFuture<'a, Result<(), MessageBusError>> {
        Box::pin(async move {
            if self.state.lock().unwrap().fail_requeue {
                return Err(MessageBusError::PublishFailed {
                    routing_key: "matching_queue".to_string(),
                    reason: "broker unavailable".to_string(),
                });
            }

            let retry_count = delivery.retry_count + 1;
            self.record(BusOperation::Requeue {
                delivery_tag: delivery.delivery_tag,
                retry_count,
            });

            let copy = Delivery::new(
                self.next_tag(),
                delivery.routing_key.clone(),
                delivery.payload.clone(),
            )
            .with_retry_count(retry_count);
            self.enqueue(copy);
            Ok(())
        })
    }

    fn nack<'a>(
        &'a self,
        delivery: &'a Delivery,
        requeue: bool,
    ) -> BoxFuture<'a, Result<(), MessageBusError>> {
        Box::pin(async move {
            self.record(BusOperation::Nack {
                delivery_tag: delivery.delivery_tag,
                requeue,
            });
            Ok(())
        })
    }

    fn dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), MessageBusError>> {
        Box::pin(async move {
            if self.state.lock().unwrap().fail_dead_letter {
                return Err(MessageBusError::PublishFailed {
                    routing_key: "matching_queue".to_string(),
                    reason: "dead-letter exchange unavailable".to_string(),
                });
            }

            self.record(BusOperation::DeadLetter {
                delivery_tag: delivery.delivery_tag,
                reason: reason.to_string(),
            });
            Ok(())
        })
    }

    fn publish<'a>(
        &'a self,
        routing_key: &'a str,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), MessageBusError>> {
        Box::pin(async move {
            if self.state.lock().unwrap().fail_publish {
                return Err(MessageBusError::PublishFailed {
                    routing_key: routing_key.to_string(),
                    reason: "publisher confirm not received".to_string(),
                });
            }

            self.record(BusOperation::Publish {
                routing_key: routing_key.to_string(),
                payload: payload.to_vec(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn subscription_drains_then_ends_after_close() {
        let bus = InMemoryMessageBus::new();
        let first = bus.deliver(b"a".to_vec());
        let second = bus.deliver(b"b".to_vec());
        bus.close();

        let mut stream = bus.subscribe("matching_queue").await.unwrap();
        assert_eq!(stream.next().await, Some(Ok(first)));
        assert_eq!(stream.next().await, Some(Ok(second)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn requeue_redelivers_with_bumped_counter() {
        let bus = InMemoryMessageBus::new();
        let original = bus.deliver_with_retry_count(b"x".to_vec(), 2);
        let mut stream = bus.subscribe("matching_queue").await.unwrap();
        let _ = stream.next().await;

        bus.requeue(&original).await.unwrap();

        let copy = stream.next().await.unwrap().unwrap();
        assert_eq!(copy.retry_count, 3);
        assert_eq!(copy.payload, b"x");
        assert_ne!(copy.delivery_tag, original.delivery_tag);
    }

    #[tokio::test]
    async fn second_subscription_fails() {
        let bus = InMemoryMessageBus::new();
        let _stream = bus.subscribe("matching_queue").await.unwrap();

        let err = bus.subscribe("matching_queue").await.err().unwrap();
        assert!(matches!(err, MessageBusError::SubscriptionFailed { .. }));
    }
}
