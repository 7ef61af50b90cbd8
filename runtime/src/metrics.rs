//! Prometheus metrics for the matching worker.
//!
//! Metrics are recorded through the `metrics` facade, so they are free no-ops
//! until [`install_exporter`] installs a recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use ride_matching_runtime::metrics::install_exporter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serves http://0.0.0.0:9090/metrics
//! install_exporter("0.0.0.0:9090".parse()?)?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Deliveries taken off the queue.
pub const EVENTS_RECEIVED: &str = "matching_events_received_total";
/// Orchestrator outcomes, labelled by `outcome`.
pub const OUTCOMES: &str = "matching_outcomes_total";
/// Broker settlements, labelled by `disposition`.
pub const DISPOSITIONS: &str = "matching_dispositions_total";
/// Messages moved to the quarantine queue.
pub const DEAD_LETTERED: &str = "matching_dead_lettered_total";
/// `ride.matching_failed` publications, labelled by `result`.
pub const FAILURE_NOTIFICATIONS: &str = "matching_failure_notifications_total";
/// Wall time from delivery to settlement.
pub const EVENT_DURATION: &str = "matching_event_duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build or install the Prometheus exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and serve it over HTTP on `addr`.
///
/// Must be called from within a Tokio runtime, and only once per process.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if the listener cannot be bound or a
/// recorder is already installed.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .map_err(|e| MetricsError::Install(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();
    tracing::info!(addr = %addr, "Metrics exporter listening at http://{addr}/metrics");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(EVENTS_RECEIVED, "Deliveries taken off the matching queue");
    describe_counter!(OUTCOMES, "Matching outcomes by kind");
    describe_counter!(DISPOSITIONS, "Broker settlements by disposition");
    describe_counter!(DEAD_LETTERED, "Messages moved to the dead-letter queue");
    describe_counter!(
        FAILURE_NOTIFICATIONS,
        "ride.matching_failed publications by result"
    );
    describe_histogram!(EVENT_DURATION, "Time from delivery to settlement");
}
