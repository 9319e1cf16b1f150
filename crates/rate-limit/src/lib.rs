//! Token-rate pacing for streaming producers.
//!
//! A [`StreamRateLimiter`] is a token bucket built on the governor crate. Producers
//! consult it before writing into a stream so that a fast upstream cannot flood a
//! consumer faster than the configured sustained rate.

#![deny(missing_docs)]

mod error;
mod limiter;

pub use error::RateLimitError;
pub use limiter::StreamRateLimiter;
