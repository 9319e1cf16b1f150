//! Shared helpers for the cross-crate streaming tests.

use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use config::Config;
use futures::StreamExt;
use llm::{BackpressureStream, ByteStream, Context, Token, UpstreamError};
use logforth::{append::Stdout, filter::EnvFilter};

static INIT: Once = Once::new();

/// Installs a stdout logger once per test binary when `TEST_LOG` is set, e.g. `TEST_LOG=debug`.
pub fn init_logging() {
    INIT.call_once(|| {
        let Ok(level) = std::env::var("TEST_LOG") else {
            return;
        };

        let filter = EnvFilter::from_str(&format!("warn,llm={level},config={level},rate_limit={level}"))
            .expect("TEST_LOG must be a valid log level");

        logforth::builder()
            .dispatch(|d| d.filter(filter).append(Stdout::default()))
            .apply();
    });
}

/// Writes `toml` to a temporary file and loads it the way the binary does.
pub fn load_config(toml: &str) -> anyhow::Result<Config> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(toml.as_bytes())?;

    Config::load(file.path())
}

/// One OpenAI-style streaming chunk carrying `content`, framed as an SSE event.
pub fn openai_event(content: &str) -> String {
    format!("data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n")
}

/// A response body delivering `chunks` one by one.
pub fn sse_body<I, B>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let chunks: Vec<Result<Bytes, UpstreamError>> = chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
    Box::pin(futures::stream::iter(chunks))
}

/// A response body delivering `chunks`, then breaking with `error`.
pub fn broken_sse_body<I, B>(chunks: I, error: UpstreamError) -> ByteStream
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let mut items: Vec<Result<Bytes, UpstreamError>> = chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
    items.push(Err(error));

    Box::pin(futures::stream::iter(items))
}

/// Reads every token until the stream ends.
pub async fn drain(stream: &Arc<BackpressureStream>) -> Vec<Token> {
    stream
        .tokens(Context::background())
        .map(|token| token.expect("reading a background context never fails"))
        .collect()
        .await
}

/// Reads every token until the stream ends and keeps only their text.
pub async fn drain_contents(stream: &Arc<BackpressureStream>) -> Vec<String> {
    drain(stream).await.into_iter().map(Token::into_content).collect()
}
