use std::time::Duration;

use thiserror::Error;

use crate::types::lease::LeaseId;

pub type VenueResult<T> = Result<T, VenueError>;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("venue rejected the API key on {endpoint} (401); it must match the one shown in the client")]
    Auth { endpoint: String },

    #[error("unexpected response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    #[error("rate limited on {endpoint}, retry after {wait:?}")]
    RateLimited { endpoint: String, wait: Duration },

    #[error("venue server error {status} on {endpoint}")]
    Server { endpoint: String, status: u16 },

    #[error("transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("venue rejected request to {endpoint} ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("lease {id} is no longer held on the venue")]
    StaleLease { id: LeaseId },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("stop requested while waiting for {what}")]
    Cancelled { what: String },
}

impl VenueError {
    pub fn malformed(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Authentication and schema failures leave the venue unusable for this process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::MalformedResponse { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Server { .. } | Self::RateLimited { .. }
        )
    }

    /// Venue-requested pause, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait, .. } => Some(*wait),
            _ => None,
        }
    }
}
