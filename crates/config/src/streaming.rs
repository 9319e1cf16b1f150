//! Streaming transport configuration structures.

use std::time::Duration;

use anyhow::bail;
use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};

/// Configuration for token streaming between providers and consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Queue sizing and overflow behaviour for every stream.
    pub backpressure: BackpressureConfig,
    /// Optional pacing applied to producers before they write.
    pub pacing: Option<PacingConfig>,
    /// Settings for fanning one stream out to several consumers.
    pub fanout: FanoutConfig,
}

impl StreamingConfig {
    /// Validates every section of the streaming configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.backpressure.validate()?;

        if let Some(pacing) = &self.pacing {
            pacing.validate()?;
        }

        self.fanout.validate()
    }
}

/// What a writer does when the queue is at or above its high water mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// The writer waits for the consumer to free a slot.
    #[default]
    Block,
    /// The oldest queued token is evicted to make room for the new one.
    DropOldest,
    /// The incoming token is discarded when the queue is full.
    DropNewest,
    /// The write fails with a buffer-full error.
    Reject,
}

/// Bounded queue configuration for a backpressure stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackpressureConfig {
    /// Maximum number of queued tokens.
    pub buffer_size: usize,
    /// Occupancy fraction at which the drop policy takes over, in (0, 1].
    pub high_water_mark: f64,
    /// Occupancy fraction at which a throttled stream returns to normal, in (0, 1).
    pub low_water_mark: f64,
    /// Overflow behaviour once the high water mark is reached.
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            high_water_mark: 0.8,
            low_water_mark: 0.2,
            drop_policy: DropPolicy::Block,
        }
    }
}

impl BackpressureConfig {
    /// Validates the buffer size and the watermark ordering `0 < low < high <= 1`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.buffer_size == 0 {
            bail!("streaming.backpressure.buffer_size must be greater than zero");
        }

        if !(self.high_water_mark > 0.0 && self.high_water_mark <= 1.0) {
            bail!(
                "streaming.backpressure.high_water_mark must be in (0, 1], got {}",
                self.high_water_mark
            );
        }

        if !(self.low_water_mark > 0.0 && self.low_water_mark < self.high_water_mark) {
            bail!(
                "streaming.backpressure.low_water_mark must be in (0, high_water_mark), got {} with high_water_mark {}",
                self.low_water_mark,
                self.high_water_mark
            );
        }

        Ok(())
    }
}

/// Token-rate pacing for producers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    /// Sustained tokens per second.
    pub tokens_per_second: u32,
    /// Tokens that may be written back to back before pacing applies.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

impl PacingConfig {
    /// Validates that both the rate and the burst are non-zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tokens_per_second == 0 {
            bail!("streaming.pacing.tokens_per_second must be greater than zero");
        }

        if self.burst == 0 {
            bail!("streaming.pacing.burst must be greater than zero");
        }

        Ok(())
    }
}

/// Fan-out settings for multiplexed streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FanoutConfig {
    /// How long a broadcast write may wait on one consumer before it is detached.
    #[serde(deserialize_with = "deserialize_duration")]
    pub slow_consumer_timeout: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            slow_consumer_timeout: Duration::from_secs(30),
        }
    }
}

impl FanoutConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.slow_consumer_timeout.is_zero() {
            bail!("streaming.fanout.slow_consumer_timeout must be greater than zero");
        }

        Ok(())
    }
}
