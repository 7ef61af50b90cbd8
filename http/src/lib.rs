//! HTTP clients for the collaborator services of the ride-matching worker.
//!
//! - [`DriversClient`] implements [`DriverLookup`] and [`DriverStatusUpdate`]
//!   against the drivers service.
//! - [`RidesClient`] implements [`RideAssignment`] against the rides service.
//!
//! Both share one [`reqwest::Client`] built by [`http_client`], which carries
//! the per-request deadline. The clients never retry; that decision belongs to
//! the orchestrator.
//!
//! # Example
//!
//! ```no_run
//! use ride_matching_http::{DriversClient, RidesClient, http_client};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = http_client(Duration::from_secs(10))?;
//! let drivers = DriversClient::new(client.clone(), "http://drivers:8004")?;
//! let rides = RidesClient::new(client, "http://rides:8003")?;
//! # Ok(())
//! # }
//! ```
//!
//! [`DriverLookup`]: ride_matching_core::DriverLookup
//! [`DriverStatusUpdate`]: ride_matching_core::DriverStatusUpdate
//! [`RideAssignment`]: ride_matching_core::RideAssignment

mod drivers;
mod endpoint;
mod rides;

pub use drivers::DriversClient;
pub use endpoint::ServiceEndpoint;
pub use rides::RidesClient;

use std::time::Duration;
use thiserror::Error;

/// Errors raised while constructing a client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The configured base URL is unusable
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// reqwest could not build the client
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Build the shared HTTP client. Every request made through it fails after `timeout`.
///
/// # Errors
///
/// Returns [`ClientError::Build`] if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
