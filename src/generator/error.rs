//! Error types for generator requests.

use std::time::Duration;

use thiserror::Error;

/// Errors from talking to the generator service.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The service could not be reached.
    #[error("generator unavailable: {message}")]
    Unavailable {
        /// Transport-level description.
        message: String,
    },

    /// The request exceeded the configured timeout.
    #[error("generator request timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Configured per-request timeout.
        timeout: Duration,
    },

    /// The response body could not be understood.
    #[error("malformed generator response: {message}")]
    Protocol {
        /// What was wrong with the body.
        message: String,
    },

    /// The service answered with an error.
    #[error("generator error: {message}")]
    Service {
        /// Error text reported by the service.
        message: String,
    },
}

impl GeneratorError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that take the degraded offline path.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Maps a transport error, distinguishing timeouts.
    pub(crate) fn from_transport(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout { timeout }
        } else if error.is_decode() {
            Self::protocol(error.to_string())
        } else {
            Self::Unavailable {
                message: error.to_string(),
            }
        }
    }
}
