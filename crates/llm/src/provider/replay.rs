use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use config::BackpressureConfig;
use futures::StreamExt;

use super::{ByteStream, Provider, json_delta, pump};
use crate::context::Context;
use crate::error::LlmError;
use crate::messages::ChatCompletionRequest;
use crate::stream::BackpressureStream;
use crate::token::UpstreamError;

const OPENAI_DELTA_CONTENT: &str = "/choices/0/delta/content";

/// Provider replaying a recorded OpenAI-style SSE response body.
///
/// Useful for load tests and demos: every request gets the same body, chunk by
/// chunk, with an optional delay between chunks to mimic network pacing.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    name: String,
    body: Vec<Result<Bytes, UpstreamError>>,
    chunk_delay: Duration,
    backpressure: BackpressureConfig,
    pointer: String,
}

impl ReplayProvider {
    pub fn new<I, B>(name: impl Into<String>, body: I, backpressure: BackpressureConfig) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            name: name.into(),
            body: body.into_iter().map(|chunk| Ok(chunk.into())).collect(),
            chunk_delay: Duration::ZERO,
            backpressure,
            pointer: OPENAI_DELTA_CONTENT.to_string(),
        }
    }

    /// Waits this long before handing out each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Reads token text from this JSON pointer instead of the OpenAI delta.
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = pointer.into();
        self
    }

    /// Breaks the connection with `error` after the recorded body.
    pub fn with_failure(mut self, error: UpstreamError) -> Self {
        self.body.push(Err(error));
        self
    }

    fn body(&self) -> ByteStream {
        let delay = self.chunk_delay;

        let chunks = futures::stream::iter(self.body.clone()).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            chunk
        });

        Box::pin(chunks)
    }
}

#[async_trait]
impl Provider for ReplayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        ctx: &Context,
    ) -> Result<Arc<BackpressureStream>, LlmError> {
        log::debug!(
            "Replaying {} chunks for model '{}' with {} messages",
            self.body.len(),
            request.model,
            request.messages.len()
        );

        let stream = Arc::new(BackpressureStream::new(self.backpressure.clone())?);

        let bytes = self.body();
        let decode = json_delta(self.pointer.clone());
        let producer = Arc::clone(&stream);
        let ctx = ctx.clone();
        let name = self.name.clone();

        tokio::spawn(async move {
            if let Err(e) = pump(bytes, decode, &producer, &ctx).await {
                log::debug!("Replay for provider '{name}' stopped early: {e}");
            }
        });

        Ok(stream)
    }
}
