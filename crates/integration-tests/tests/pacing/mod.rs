use std::sync::Arc;
use std::time::{Duration, Instant};

use indoc::indoc;
use integration_tests::{drain_contents, init_logging, load_config};
use llm::{BackpressureStream, Cancellation, Context, PacedWriter, StreamError, Token};
use rate_limit::{RateLimitError, StreamRateLimiter};

#[tokio::test]
async fn paced_writer_spreads_tokens_after_burst() {
    init_logging();

    let config = load_config(indoc! {r#"
        [streaming.backpressure]
        buffer_size = 64

        [streaming.pacing]
        tokens_per_second = 100
        burst = 5
    "#})
    .unwrap();

    let pacing = config.streaming.pacing.clone().unwrap();
    let stream = Arc::new(BackpressureStream::new(config.streaming.backpressure).unwrap());
    let writer = PacedWriter::new(Arc::clone(&stream), &pacing).unwrap();

    let ctx = Context::background();
    let started = Instant::now();

    for index in 0..15 {
        writer.write(&ctx, Token::new(index, "t")).await.unwrap();
    }
    writer.close();

    // Five tokens ride the burst, the other ten wait 10ms each.
    assert!(started.elapsed() >= Duration::from_millis(80));
    assert_eq!(drain_contents(&stream).await.len(), 15);
}

#[tokio::test]
async fn paced_writer_gives_up_at_deadline() {
    init_logging();

    let config = load_config(indoc! {r#"
        [streaming.pacing]
        tokens_per_second = 1
    "#})
    .unwrap();

    let pacing = config.streaming.pacing.clone().unwrap();
    assert_eq!(pacing.burst, 1);

    let stream = Arc::new(BackpressureStream::new(config.streaming.backpressure).unwrap());
    let writer = PacedWriter::new(Arc::clone(&stream), &pacing).unwrap();

    writer.write(&Context::background(), Token::new(0, "free")).await.unwrap();

    let ctx = Context::background().with_timeout(Duration::from_millis(30));
    let result = writer.write(&ctx, Token::new(1, "waits")).await;

    assert_eq!(result, Err(StreamError::Cancelled(Cancellation::DeadlineExceeded)));
    assert_eq!(stream.stats().written, 1);
}

#[test]
fn limiter_reports_retry_after_and_capacity() {
    let config = load_config(indoc! {r#"
        [streaming.pacing]
        tokens_per_second = 10
        burst = 3
    "#})
    .unwrap();

    let limiter = StreamRateLimiter::new(config.streaming.pacing.as_ref().unwrap()).unwrap();

    assert!(limiter.check_n(3).is_ok());

    let error = limiter.check_n(1).unwrap_err();
    assert!(error.retry_after().is_some_and(|wait| wait <= Duration::from_millis(100)));

    let error = limiter.check_n(4).unwrap_err();
    assert!(matches!(error, RateLimitError::InsufficientCapacity { requested: 4, burst: 3 }));
}

#[test]
fn zero_rate_is_rejected_on_load() {
    let error = load_config(indoc! {r#"
        [streaming.pacing]
        tokens_per_second = 0
    "#})
    .unwrap_err();

    insta::assert_snapshot!(error, @"streaming.pacing.tokens_per_second must be greater than zero");
}
