//! Error types for stream pacing.

use std::time::Duration;

/// Errors that can occur while pacing a stream.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The bucket does not hold enough tokens right now.
    #[error("Token rate limit exceeded, retry after {retry_after:?}")]
    LimitExceeded {
        /// Time to wait before retrying.
        retry_after: Duration,
    },

    /// The request asks for more tokens than the burst can ever hold.
    #[error("Requested {requested} tokens but the burst capacity is {burst}")]
    InsufficientCapacity {
        /// Number of tokens requested.
        requested: u32,
        /// Configured burst capacity.
        burst: u32,
    },

    /// The pacing configuration cannot be turned into a quota.
    #[error("Invalid pacing configuration: {0}")]
    InvalidConfig(String),
}

impl RateLimitError {
    /// Get the retry-after duration if waiting can help.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after } => Some(*retry_after),
            Self::InsufficientCapacity { .. } | Self::InvalidConfig(_) => None,
        }
    }
}
