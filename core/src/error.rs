//! Failure taxonomy of the three collaborator calls.
//!
//! Each call has its own error type so the orchestrator can decide, per step,
//! whether a failure is worth a redelivery or must be swallowed.

use thiserror::Error;

/// Finding an available driver failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The drivers service could not be reached or did not answer in time
    #[error("drivers service unreachable: {0}")]
    Transport(String),

    /// The drivers service answered with an unexpected status
    #[error("drivers service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for logging
        body: String,
    },

    /// A `200` response whose body is not a usable driver
    #[error("drivers service returned an invalid driver: {0}")]
    InvalidDriver(String),
}

impl LookupError {
    /// Whether redelivering the event might succeed.
    ///
    /// A broken driver payload will not fix itself on redelivery; everything
    /// else is a transport or server-side condition.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidDriver(_))
    }
}

/// Binding a driver to a ride failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    /// The rides service could not be reached or did not answer in time
    #[error("rides service unreachable: {0}")]
    Transport(String),

    /// The rides service refused the assignment (non-2xx)
    #[error("rides service rejected assignment with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, for logging
        body: String,
    },
}

/// Moving a driver to `ON_TRIP` failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateError {
    /// The drivers service could not be reached or did not answer in time
    #[error("drivers service unreachable: {0}")]
    Transport(String),

    /// The drivers service refused the transition (non-2xx)
    #[error("drivers service rejected status update with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, for logging
        body: String,
    },
}

impl StatusUpdateError {
    /// Transport failures and server errors may clear up; client errors will not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_driver_is_not_retryable() {
        assert!(!LookupError::InvalidDriver("missing driverId".into()).is_retryable());
        assert!(LookupError::Transport("connection refused".into()).is_retryable());
        assert!(
            LookupError::Status {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn status_update_transience() {
        assert!(StatusUpdateError::Transport("timeout".into()).is_transient());
        assert!(
            StatusUpdateError::Rejected {
                status: 502,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !StatusUpdateError::Rejected {
                status: 404,
                body: "driver not found".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn assignment_error_mentions_status() {
        let err = AssignmentError::Rejected {
            status: 409,
            body: "ride already matched".into(),
        };
        assert_eq!(
            err.to_string(),
            "rides service rejected assignment with status 409: ride already matched"
        );
    }
}
