//! Direct (unkeyed) token bucket used to pace stream producers.

use std::num::NonZeroU32;

use config::PacingConfig;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, InsufficientCapacity, Quota, RateLimiter};

use crate::error::RateLimitError;

/// Token bucket pacing the writes of one stream.
///
/// The bucket refills at `tokens_per_second` and holds at most `burst` tokens.
/// One streamed token consumes one bucket token.
pub struct StreamRateLimiter {
    limiter: DefaultDirectRateLimiter,
    burst: NonZeroU32,
}

impl StreamRateLimiter {
    /// Create a limiter from a pacing configuration.
    pub fn new(config: &PacingConfig) -> Result<Self, RateLimitError> {
        let per_second = NonZeroU32::new(config.tokens_per_second)
            .ok_or_else(|| RateLimitError::InvalidConfig("tokens_per_second must be greater than zero".to_string()))?;

        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| RateLimitError::InvalidConfig("burst must be greater than zero".to_string()))?;

        let quota = Quota::per_second(per_second).allow_burst(burst);
        log::debug!("Created stream pacing quota: {quota:?}");

        Ok(Self {
            limiter: RateLimiter::direct(quota),
            burst,
        })
    }

    /// Consume one token if available, without waiting.
    pub fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Atomically consume `tokens` tokens, or report how long to wait.
    pub fn check_n(&self, tokens: u32) -> Result<(), RateLimitError> {
        let Some(n) = NonZeroU32::new(tokens) else {
            return Ok(());
        };

        match self.limiter.check_n(n) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(not_until)) => {
                let retry_after = not_until.wait_time_from(DefaultClock::default().now());
                log::debug!("Stream pacing blocked {tokens} tokens, retry after {retry_after:?}");

                Err(RateLimitError::LimitExceeded { retry_after })
            }
            Err(InsufficientCapacity(_)) => Err(RateLimitError::InsufficientCapacity {
                requested: tokens,
                burst: self.burst.get(),
            }),
        }
    }

    /// Wait until one token is available and consume it.
    ///
    /// The returned future is cancel-safe: dropping it consumes nothing.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Configured burst capacity.
    pub fn burst(&self) -> u32 {
        self.burst.get()
    }
}
