mod pump;
mod replay;

pub use pump::{json_delta, pump};
pub use replay::ReplayProvider;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::context::Context;
use crate::error::LlmError;
use crate::messages::ChatCompletionRequest;
use crate::stream::BackpressureStream;
use crate::token::UpstreamError;

/// Raw response body chunks as they arrive from a provider.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// Trait for LLM provider implementations.
///
/// Note for async_trait: the registry stores providers as trait objects, so the
/// trait has to stay dyn-compatible.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used as the `provider` part of `provider/model`.
    fn name(&self) -> &str;

    /// Starts a streaming completion.
    ///
    /// The returned stream is already being filled in the background. The
    /// provider closes it when the response ends, after a final token carrying
    /// the error if the response failed midway.
    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        ctx: &Context,
    ) -> Result<Arc<BackpressureStream>, LlmError>;
}
