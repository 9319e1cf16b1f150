//! Streaming transport core for LLM completions.
//!
//! A provider writes [`Token`]s into a [`BackpressureStream`] while a consumer
//! reads them. The stream bounds memory by the configured buffer size and
//! applies the configured [`DropPolicy`] once its high water mark is reached.
//! Every call that may suspend takes a [`Context`] and returns as soon as the
//! context is cancelled or its deadline passes.

pub mod buffer;
mod context;
mod error;
mod messages;
mod metrics;
pub mod provider;
mod registry;
pub mod sse;
mod stream;
mod token;

pub use config::{BackpressureConfig, DropPolicy, FanoutConfig, PacingConfig};
pub use context::Context;
pub use error::{BufferError, Cancellation, LlmError, StreamError};
pub use messages::{ChatCompletionRequest, ChatMessage, ChatRole};
pub use metrics::{STREAM_TOKENS_DROPPED, STREAM_TOKENS_READ, STREAM_TOKENS_WRITTEN, STREAM_WRITES_BLOCKED};
pub use provider::{ByteStream, Provider};
pub use registry::ProviderRegistry;
pub use stream::{BackpressureStream, FlowState, PacedWriter, StreamMultiplexer, StreamStats};
pub use token::{Token, UpstreamError};

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
