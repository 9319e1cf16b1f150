use std::sync::Arc;
use std::time::Duration;

use indoc::indoc;
use integration_tests::{drain_contents, init_logging, load_config};
use llm::{BackpressureConfig, BackpressureStream, Context, DropPolicy, StreamMultiplexer, Token};

fn consumer(buffer_size: usize, drop_policy: DropPolicy) -> BackpressureConfig {
    BackpressureConfig {
        buffer_size,
        high_water_mark: 1.0,
        low_water_mark: 0.5,
        drop_policy,
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_consumer_is_evicted_while_others_continue() {
    init_logging();

    let config = load_config(indoc! {r#"
        [streaming.backpressure]
        buffer_size = 16

        [streaming.fanout]
        slow_consumer_timeout = "50ms"
    "#})
    .unwrap();

    let source = Arc::new(BackpressureStream::new(config.streaming.backpressure.clone()).unwrap());
    let multiplexer = Arc::new(StreamMultiplexer::new(Arc::clone(&source), &config.streaming.fanout));

    let stuck = multiplexer.add_consumer(consumer(2, DropPolicy::Block)).unwrap();
    let healthy = multiplexer.add_consumer(consumer(16, DropPolicy::Block)).unwrap();
    let lossy = multiplexer.add_consumer(consumer(2, DropPolicy::DropOldest)).unwrap();

    let ctx = Context::background();
    let fanout = multiplexer.start(ctx.clone()).unwrap();

    for index in 0..5 {
        source.write(&ctx, Token::new(index, index.to_string())).await.unwrap();
    }
    source.close();

    fanout.await.unwrap();

    assert_eq!(multiplexer.consumer_count(), 0);
    assert_eq!(drain_contents(&stuck).await, ["0", "1"]);
    assert_eq!(drain_contents(&healthy).await, ["0", "1", "2", "3", "4"]);
    assert_eq!(drain_contents(&lossy).await, ["3", "4"]);
    assert_eq!(lossy.stats().dropped, 3);
}

#[tokio::test]
async fn consumer_closed_by_its_owner_is_detached() {
    init_logging();

    let source = Arc::new(BackpressureStream::new(consumer(8, DropPolicy::Block)).unwrap());
    let multiplexer = Arc::new(StreamMultiplexer::new(
        Arc::clone(&source),
        &config::FanoutConfig {
            slow_consumer_timeout: Duration::from_secs(5),
        },
    ));

    let gone = multiplexer.add_consumer(consumer(8, DropPolicy::Block)).unwrap();
    let staying = multiplexer.add_consumer(consumer(8, DropPolicy::Block)).unwrap();
    gone.close();

    let ctx = Context::background();
    source.write(&ctx, Token::new(0, "only")).await.unwrap();
    source.close();

    multiplexer.run(&ctx).await;

    assert_eq!(drain_contents(&gone).await, Vec::<String>::new());
    assert_eq!(drain_contents(&staying).await, ["only"]);
}

#[tokio::test]
async fn upstream_error_token_reaches_every_consumer() {
    init_logging();

    let source = Arc::new(BackpressureStream::new(consumer(8, DropPolicy::Block)).unwrap());
    let multiplexer = StreamMultiplexer::new(Arc::clone(&source), &config::FanoutConfig::default());

    let first = multiplexer.add_consumer(consumer(8, DropPolicy::Block)).unwrap();
    let second = multiplexer.add_consumer(consumer(8, DropPolicy::Block)).unwrap();

    let ctx = Context::background();
    source.write(&ctx, Token::new(0, "partial")).await.unwrap();
    source
        .close_with_error(Token::failed(1, llm::UpstreamError::Connection("reset".to_string())))
        .unwrap();

    multiplexer.run(&ctx).await;

    for stream in [first, second] {
        let tokens = integration_tests::drain(&stream).await;

        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].is_error());
    }
}
