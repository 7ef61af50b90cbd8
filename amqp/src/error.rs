//! Startup errors of the RabbitMQ bus.
//!
//! Runtime failures (publish, settle, consume) are reported as
//! [`MessageBusError`](ride_matching_core::message_bus::MessageBusError).

use thiserror::Error;

/// Errors raised while connecting to the broker and declaring topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// The connection string could not be used or the broker never answered
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    /// A channel could not be opened or configured
    #[error("Failed to set up channel: {0}")]
    Channel(String),

    /// The broker refused a declaration
    #[error("Failed to declare '{name}': {reason}")]
    Topology {
        /// Exchange, queue or binding key being declared
        name: String,
        /// Broker error
        reason: String,
    },
}

impl AmqpError {
    pub(crate) fn topology(name: &str, error: &lapin::Error) -> Self {
        Self::Topology {
            name: name.to_string(),
            reason: error.to_string(),
        }
    }
}
