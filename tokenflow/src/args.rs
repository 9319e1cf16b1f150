use std::{borrow::Cow, fmt, io::IsTerminal, path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, ValueEnum};
use config::Config;
use logforth::filter::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tokenflow", version, long_about = concat!("tokenflow v", env!("CARGO_PKG_VERSION"), ", a backpressure stream simulator"))]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "TOKENFLOW_CONFIG_PATH", default_value = "./tokenflow.toml")]
    pub config: PathBuf,
    /// Number of concurrent producer tasks writing into the stream
    #[arg(long, env = "TOKENFLOW_PRODUCERS", default_value_t = 4)]
    pub producers: usize,
    /// Tokens each producer writes before finishing
    #[arg(long, env = "TOKENFLOW_TOKENS", default_value_t = 256)]
    pub tokens_per_producer: u64,
    /// Number of consumers; more than one fans the stream out through a multiplexer
    #[arg(long, env = "TOKENFLOW_CONSUMERS", default_value_t = 1)]
    pub consumers: usize,
    /// Time a consumer spends on every token, e.g. "2ms"
    #[arg(long, env = "TOKENFLOW_CONSUMER_DELAY", default_value = "1ms", value_parser = parse_duration)]
    pub consumer_delay: Duration,
    /// Give up on a single write after this long, e.g. "250ms"
    #[arg(long, env = "TOKENFLOW_WRITE_TIMEOUT", value_parser = parse_duration)]
    pub write_timeout: Option<Duration>,
    /// Set the logging level for the workspace crates.
    #[arg(long = "log", env = "TOKENFLOW_LOG", default_value_t = LogLevel::default())]
    pub log_level: LogLevel,
    /// Set the style of log output
    #[arg(long, env = "TOKENFLOW_LOG_STYLE", default_value_t = LogStyle::default())]
    pub log_style: LogStyle,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        let config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            Config::default()
        };

        Ok(config)
    }
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    duration_str::parse(input).map_err(|e| e.to_string())
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text, used as the default with TTY output
    Color,
    /// Standard text, used as the default with non-TTY output
    Text,
    /// JSON objects
    Json,
}

impl Default for LogStyle {
    fn default() -> Self {
        if std::io::stdout().is_terminal() {
            LogStyle::Color
        } else {
            LogStyle::Text
        }
    }
}

impl AsRef<str> for LogStyle {
    fn as_ref(&self) -> &str {
        match self {
            LogStyle::Color => "color",
            LogStyle::Text => "text",
            LogStyle::Json => "json",
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub(crate) enum LogLevel {
    /// Disable logging
    Off,
    /// Only log errors
    Error,
    /// Log errors, and warnings
    Warn,
    /// Log errors, warnings, and info messages
    #[default]
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log errors, warnings, info, debug, and trace messages
    Trace,
}

impl LogLevel {
    pub fn env_filter(self) -> anyhow::Result<EnvFilter> {
        let filter_str = match self {
            LogLevel::Off => Cow::Borrowed("off"),
            // Everything else stays at warn, the workspace crates get the selected level.
            level => Cow::Owned(format!(
                "warn,tokenflow={level},llm={level},config={level},rate_limit={level}"
            )),
        };

        EnvFilter::from_str(&filter_str).map_err(|e| anyhow::anyhow!("Invalid log filter '{filter_str}': {e}"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
