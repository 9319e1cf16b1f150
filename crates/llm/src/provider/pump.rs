use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::context::Context;
use crate::sse::{SseFrame, SseFramer};
use crate::stream::BackpressureStream;
use crate::token::{Token, UpstreamError};

/// Drives a provider response body into `stream` and closes it.
///
/// Bytes are framed as Server-Sent Events, each `data:` payload goes through
/// `decode`, and every text it returns is written as the next token. A transport
/// or decode failure is appended as a final token carrying the error, so the
/// consumer sees it after everything delivered before it.
///
/// Returns the number of tokens produced. Errors are only returned when the
/// stream itself refuses a write or `ctx` ends; the stream is closed either way.
pub async fn pump<S, D>(mut bytes: S, mut decode: D, stream: &BackpressureStream, ctx: &Context) -> crate::Result<u64>
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Unpin,
    D: FnMut(&str) -> Result<Option<String>, UpstreamError>,
{
    let mut framer = SseFramer::new();
    let mut index = 0;

    let outcome: Result<(), UpstreamError> = 'body: loop {
        let chunk = match ctx.run(bytes.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(error))) => break 'body Err(error),
            Ok(None) => break 'body Ok(()),
            Err(cause) => {
                stream.close();
                return Err(cause.into());
            }
        };

        framer.push(&chunk);

        loop {
            let data = match framer.next_frame() {
                Ok(Some(SseFrame::Data { data, .. })) => data,
                Ok(Some(SseFrame::Done)) => break 'body Ok(()),
                Ok(None) => break,
                Err(error) => break 'body Err(error),
            };

            let text = match decode(&data) {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(error) => break 'body Err(error),
            };

            if let Err(error) = stream.write(ctx, Token::new(index, text)).await {
                stream.close();
                return Err(error);
            }

            index += 1;
        }
    };

    match outcome {
        Ok(()) => {
            log::debug!("Provider stream finished after {index} tokens");
            stream.close();
        }
        Err(error) => {
            log::debug!("Provider stream failed after {index} tokens: {error}");
            stream.close_with_error(Token::failed(index, error))?;
        }
    }

    Ok(index)
}

/// Decoder pulling the text at a JSON pointer out of each event payload.
///
/// Payloads carrying a top-level `error` object become
/// [`UpstreamError::Provider`]. Missing or empty text yields no token, which
/// covers role-only and finish-reason chunks.
pub fn json_delta(
    pointer: impl Into<String>,
) -> impl FnMut(&str) -> Result<Option<String>, UpstreamError> + Clone + Send + Sync + 'static {
    let pointer = pointer.into();

    move |data: &str| -> Result<Option<String>, UpstreamError> {
        let value: Value = serde_json::from_str(data)
            .map_err(|e| UpstreamError::Decode(format!("Invalid JSON in stream event: {e}")))?;

        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());

            return Err(UpstreamError::Provider(message));
        }

        let text = value
            .pointer(&pointer)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        Ok(text)
    }
}
