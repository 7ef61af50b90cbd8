//! Drivers service client.

use crate::ClientError;
use crate::endpoint::ServiceEndpoint;
use reqwest::{Client, StatusCode};
use ride_matching_core::environment::{BoxFuture, DriverLookup, DriverStatusUpdate};
use ride_matching_core::error::{LookupError, StatusUpdateError};
use ride_matching_core::types::{Driver, DriverId, DriverStatus};
use serde::Serialize;

#[derive(Serialize)]
struct StatusChange {
    status: DriverStatus,
}

/// Client for `GET /v1/drivers/available` and `PATCH /v1/drivers/{id}/status`.
#[derive(Clone, Debug)]
pub struct DriversClient {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl DriversClient {
    /// Create a client for the drivers service at `base_url`.
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

    /// Move `driver_id` to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusUpdateError::Transport`] if the request could not be
    /// completed and [`StatusUpdateError::Rejected`] for any non-2xx answer.
    pub async fn update_status(
        &self,
        driver_id: &DriverId,
        status: DriverStatus,
    ) -> Result<(), StatusUpdateError> {
        let url = self
            .endpoint
            .url(&["v1", "drivers", driver_id.as_str(), "status"]);

        let response = self
            .client
            .patch(url)
            .json(&StatusChange { status })
            .send()
            .await
            .map_err(|e| StatusUpdateError::Transport(e.to_string()))?;

        let code = response.status();
        if code.is_success() {
            tracing::debug!(driver_id = %driver_id, status = %status, "Driver status updated");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StatusUpdateError::Rejected {
            status: code.as_u16(),
            body,
        })
    }
}

impl DriverLookup for DriversClient {
    fn find_available_driver(&self) -> BoxFuture<'_, Result<Option<Driver>, LookupError>> {
        Box::pin(async move {
            let url = self.endpoint.url(&["v1", "drivers", "available"]);

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| LookupError::Transport(e.to_string()))?;

            match response.status() {
                StatusCode::OK => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| LookupError::Transport(e.to_string()))?;
                    let driver: Driver = serde_json::from_slice(&body)
                        .map_err(|e| LookupError::InvalidDriver(e.to_string()))?;
                    if driver.driver_id.as_str().is_empty() {
                        return Err(LookupError::InvalidDriver("empty driverId".to_string()));
                    }
                    Ok(Some(driver))
                },
                StatusCode::NO_CONTENT => Ok(None),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(LookupError::Status {
                        status: status.as_u16(),
                        body,
                    })
                },
            }
        })
    }
}

impl DriverStatusUpdate for DriversClient {
    fn mark_driver_on_trip<'a>(
        &'a self,
        driver_id: &'a DriverId,
    ) -> BoxFuture<'a, Result<(), StatusUpdateError>> {
        Box::pin(self.update_status(driver_id, DriverStatus::OnTrip))
    }
}
