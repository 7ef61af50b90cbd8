//! Exchanges, queues and bindings the worker relies on.
//!
//! ```text
//! ride_events (topic) ──ride.requested──► matching_queue
//! ride_events.dlx (direct) ──matching_queue──► matching_queue.dlq
//! ```
//!
//! Everything is durable and declared idempotently at startup, so the worker
//! can start before or after the rides service.

use crate::error::AmqpError;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use ride_matching_core::event::RIDE_REQUESTED;

/// Names of everything the worker declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    /// Topic exchange ride events are published to
    pub exchange: String,
    /// Queue the worker consumes
    pub queue: String,
    /// Routing key binding `queue` to `exchange`
    pub binding_key: String,
    /// Direct exchange for quarantined messages
    pub dead_letter_exchange: String,
    /// Queue holding quarantined messages
    pub dead_letter_queue: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self::for_queue("ride_events", "matching_queue")
    }
}

impl Topology {
    /// Derive the full topology from an exchange and queue name.
    ///
    /// The dead-letter exchange is `<exchange>.dlx` and the dead-letter queue
    /// is `<queue>.dlq`, bound with the queue name as routing key.
    #[must_use]
    pub fn for_queue(exchange: &str, queue: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            binding_key: RIDE_REQUESTED.to_string(),
            dead_letter_exchange: format!("{exchange}.dlx"),
            dead_letter_queue: format!("{queue}.dlq"),
        }
    }

    /// Routing key used when publishing to the dead-letter exchange.
    #[must_use]
    pub fn dead_letter_routing_key(&self) -> &str {
        &self.queue
    }

    /// Declare both exchanges, both queues and their bindings.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::Topology`] naming the first declaration the broker
    /// refused, e.g. an existing queue with different arguments.
    pub async fn declare(&self, channel: &Channel) -> Result<(), AmqpError> {
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::topology(&self.exchange, &e))?;

        channel
            .queue_declare(&self.queue, durable_queue(), FieldTable::default())
            .await
            .map_err(|e| AmqpError::topology(&self.queue, &e))?;

        channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                &self.binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::topology(&self.binding_key, &e))?;

        channel
            .exchange_declare(
                &self.dead_letter_exchange,
                ExchangeKind::Direct,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::topology(&self.dead_letter_exchange, &e))?;

        channel
            .queue_declare(&self.dead_letter_queue, durable_queue(), FieldTable::default())
            .await
            .map_err(|e| AmqpError::topology(&self.dead_letter_queue, &e))?;

        channel
            .queue_bind(
                &self.dead_letter_queue,
                &self.dead_letter_exchange,
                self.dead_letter_routing_key(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::topology(&self.dead_letter_queue, &e))?;

        tracing::info!(
            exchange = %self.exchange,
            queue = %self.queue,
            dead_letter_queue = %self.dead_letter_queue,
            "Declared broker topology"
        );
        Ok(())
    }
}

fn durable_exchange() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..ExchangeDeclareOptions::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    }
}
