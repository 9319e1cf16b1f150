//! Configuration structures mapping the tokenflow TOML configuration.

#![deny(missing_docs)]

mod loader;
mod streaming;

use std::path::Path;

use serde::Deserialize;

pub use streaming::{BackpressureConfig, DropPolicy, FanoutConfig, PacingConfig, StreamingConfig};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Streaming transport settings.
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the values that serde alone cannot check.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.streaming.validate()
    }
}
