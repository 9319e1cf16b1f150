use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use integration_tests::{broken_sse_body, drain, drain_contents, init_logging, openai_event, sse_body};
use llm::buffer::ChunkReader;
use llm::provider::{ReplayProvider, json_delta, pump};
use llm::{
    BackpressureConfig, BackpressureStream, ChatCompletionRequest, ChatMessage, Context, DropPolicy, LlmError,
    ProviderRegistry, UpstreamError,
};

const WORDS: [&str; 6] = ["Streams", " bend", " but", " do", " not", " break"];

fn backpressure(drop_policy: DropPolicy) -> BackpressureConfig {
    BackpressureConfig {
        buffer_size: 4,
        high_water_mark: 0.75,
        low_water_mark: 0.25,
        drop_policy,
    }
}

fn recorded_body() -> String {
    let mut body: String = WORDS.iter().map(|word| openai_event(word)).collect();
    body.push_str(": keep-alive\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn body_split_at_arbitrary_offsets_yields_every_token() {
    init_logging();

    let body = recorded_body();

    for chunk_size in [1, 3, 7, 64, body.len()] {
        let chunks: Vec<Bytes> = ChunkReader::new(body.as_bytes(), chunk_size)
            .unwrap()
            .iter()
            .map(Bytes::copy_from_slice)
            .collect();

        let stream = Arc::new(BackpressureStream::new(backpressure(DropPolicy::Block)).unwrap());
        let producer = {
            let stream = Arc::clone(&stream);
            tokio::spawn(async move {
                pump(
                    sse_body(chunks),
                    json_delta("/choices/0/delta/content"),
                    &stream,
                    &Context::background(),
                )
                .await
            })
        };

        assert_eq!(drain_contents(&stream).await.concat(), WORDS.concat(), "chunk size {chunk_size}");
        assert_eq!(producer.await.unwrap(), Ok(6));
    }
}

#[tokio::test]
async fn mid_stream_failure_is_delivered_last() {
    init_logging();

    let stream = Arc::new(BackpressureStream::new(backpressure(DropPolicy::DropOldest)).unwrap());
    let body = broken_sse_body(
        [openai_event("one"), openai_event("two")],
        UpstreamError::Connection("connection reset by peer".to_string()),
    );

    pump(body, json_delta("/choices/0/delta/content"), &stream, &Context::background())
        .await
        .unwrap();

    let tokens = drain(&stream).await;
    let last = tokens.last().unwrap();

    assert_eq!(tokens.len(), 3);
    assert_eq!(last.index(), 2);
    insta::assert_snapshot!(last.error().unwrap(), @"Connection error: connection reset by peer");
}

#[tokio::test]
async fn failure_survives_a_full_queue() {
    init_logging();

    let stream = Arc::new(BackpressureStream::new(backpressure(DropPolicy::DropNewest)).unwrap());
    let words: Vec<String> = (0..10).map(|n| openai_event(&n.to_string())).collect();
    let body = broken_sse_body(words, UpstreamError::Provider("overloaded".to_string()));

    pump(body, json_delta("/choices/0/delta/content"), &stream, &Context::background())
        .await
        .unwrap();

    let tokens = drain(&stream).await;

    assert_eq!(tokens.len(), 4);
    assert!(tokens.last().unwrap().is_error());
}

#[tokio::test(start_paused = true)]
async fn registry_routes_to_replay_provider() {
    init_logging();

    let mut registry = ProviderRegistry::new();
    registry.register(
        ReplayProvider::new("replay", WORDS.map(openai_event), backpressure(DropPolicy::Block))
            .with_chunk_delay(Duration::from_millis(20)),
    );

    let request = ChatCompletionRequest::streaming("replay/recorded-1", vec![ChatMessage::user("Say something")]);
    let stream = registry
        .chat_completion_stream(request, &Context::background())
        .await
        .unwrap();

    assert_eq!(drain_contents(&stream).await.concat(), WORDS.concat());
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_request_stops_the_provider() {
    init_logging();

    let mut registry = ProviderRegistry::new();
    registry.register(
        ReplayProvider::new("replay", WORDS.map(openai_event), backpressure(DropPolicy::Block))
            .with_chunk_delay(Duration::from_secs(1)),
    );

    let ctx = Context::background();
    let request = ChatCompletionRequest::streaming("replay/recorded-1", Vec::new());
    let stream = registry.chat_completion_stream(request, &ctx).await.unwrap();

    let first = stream.read(&ctx).await.unwrap();
    assert_eq!(first.content(), "Streams");

    ctx.cancel();

    let rest = drain(&stream).await;
    assert!(rest.len() < WORDS.len() - 1);
    assert!(stream.is_closed());
}

#[tokio::test]
async fn unknown_provider_is_an_error() {
    let registry = ProviderRegistry::new();
    let request = ChatCompletionRequest::streaming("missing/model", Vec::new());

    let result = registry.chat_completion_stream(request, &Context::background()).await;

    assert!(matches!(result, Err(LlmError::ProviderNotFound(name)) if name == "missing"));
}
