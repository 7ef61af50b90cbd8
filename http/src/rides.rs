//! Rides service client.

use crate::ClientError;
use crate::endpoint::ServiceEndpoint;
use reqwest::Client;
use ride_matching_core::environment::{BoxFuture, RideAssignment};
use ride_matching_core::error::AssignmentError;
use ride_matching_core::types::{DriverId, RideId};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest<'a> {
    driver_id: &'a DriverId,
}

/// Client for `PATCH /v1/rides/{id}/assign`.
#[derive(Clone, Debug)]
pub struct RidesClient {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl RidesClient {
    /// Create a client for the rides service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if `base_url` is not a usable URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            endpoint: ServiceEndpoint::parse(base_url)?,
        })
    }
}

impl RideAssignment for RidesClient {
    fn assign_driver<'a>(
        &'a self,
        ride_id: &'a RideId,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), AssignmentError>> {
        Box::pin(async move {
            let url = self
                .endpoint
                .url(&["v1", "rides", ride_id.as_str(), "assign"]);

            let response = self
                .client
                .patch(url)
                .json(&AssignRequest { driver_id })
                .send()
                .await
                .map_err(|e| AssignmentError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            Err(AssignmentError::Rejected {
                status: status.as_u16(),
                body,
            })
        })
    }
}
