use std::sync::Arc;
use std::time::Duration;

use config::DropPolicy;
use indoc::{formatdoc, indoc};
use integration_tests::{drain, drain_contents, init_logging, load_config};
use llm::{BackpressureStream, Context, FlowState, StreamError, Token};

fn stream_from(toml: &str) -> Arc<BackpressureStream> {
    init_logging();

    let config = load_config(toml).unwrap();
    Arc::new(BackpressureStream::new(config.streaming.backpressure).unwrap())
}

fn policy_config(policy: &str, buffer_size: usize) -> String {
    formatdoc! {r#"
        [streaming.backpressure]
        buffer_size = {buffer_size}
        high_water_mark = 0.75
        low_water_mark = 0.25
        drop_policy = "{policy}"
    "#}
}

#[tokio::test]
async fn drop_oldest_evicts_at_high_water_mark() {
    let stream = stream_from(indoc! {r#"
        [streaming.backpressure]
        buffer_size = 3
        high_water_mark = 0.9
        low_water_mark = 0.5
        drop_policy = "drop_oldest"
    "#});

    let ctx = Context::background();
    for (index, content) in ["a", "b", "c", "d"].into_iter().enumerate() {
        stream.write(&ctx, Token::new(index as u64, content)).await.unwrap();
    }
    stream.close();

    assert_eq!(stream.stats().dropped, 1);
    assert_eq!(drain_contents(&stream).await, ["b", "c", "d"]);
}

#[tokio::test]
async fn drop_newest_never_exceeds_capacity() {
    let stream = stream_from(&policy_config("drop_newest", 4));
    let ctx = Context::background();

    for index in 0..10 {
        stream.write(&ctx, Token::new(index, index.to_string())).await.unwrap();
        assert!(stream.len() <= 4);
    }
    stream.close();

    let stats = stream.stats();
    assert_eq!(stats.written, 4);
    assert_eq!(stats.dropped, 6);

    let indices: Vec<_> = drain(&stream).await.iter().map(Token::index).collect();
    assert_eq!(indices, [0, 1, 2, 3]);
}

#[tokio::test]
async fn reject_policy_reports_buffer_full() {
    let stream = stream_from(&policy_config("reject", 4));
    let ctx = Context::background();

    for index in 0..3 {
        stream.write(&ctx, Token::new(index, "ok")).await.unwrap();
    }

    let result = stream.write(&ctx, Token::new(3, "rejected")).await;

    assert_eq!(result, Err(StreamError::BufferFull));
    assert_eq!(stream.len(), 3);
    assert_eq!(stream.stats().dropped, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_policy_preserves_order() {
    for policy in ["block", "drop_oldest", "drop_newest", "reject"] {
        let stream = stream_from(&policy_config(policy, 4));

        let producer = {
            let stream = Arc::clone(&stream);

            tokio::spawn(async move {
                let ctx = Context::background();

                for index in 0..500 {
                    match stream.write(&ctx, Token::new(index, "t")).await {
                        Ok(()) | Err(StreamError::BufferFull) => {}
                        Err(e) => return Err(e),
                    }
                }

                stream.close();
                Ok(())
            })
        };

        let indices: Vec<_> = drain(&stream).await.iter().map(Token::index).collect();
        producer.await.unwrap().unwrap();

        assert!(
            indices.windows(2).all(|pair| pair[0] < pair[1]),
            "{policy} delivered tokens out of order"
        );

        if policy == "block" {
            assert_eq!(indices.len(), 500);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_drop_oldest_writers_never_deadlock() {
    let stream = stream_from(&policy_config("drop_oldest", 8));
    let mut writers = tokio::task::JoinSet::new();

    for writer in 0..16u64 {
        let stream = Arc::clone(&stream);

        writers.spawn(async move {
            for n in 0..250 {
                let ctx = Context::background().with_timeout(Duration::from_secs(5));
                stream.write(&ctx, Token::new(writer * 1000 + n, "t")).await?;
            }

            Ok::<_, StreamError>(())
        });
    }

    let reader = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { drain(&stream).await.len() as u64 })
    };

    let all_written = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(result) = writers.join_next().await {
            result.unwrap().unwrap();
        }
    })
    .await;

    assert!(all_written.is_ok(), "writers did not finish in time");

    stream.close();
    let read = reader.await.unwrap();

    let stats = stream.stats();
    assert_eq!(stats.written, 16 * 250);
    assert_eq!(stats.read, read);
    assert_eq!(stats.written, stats.read + stats.dropped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stats_never_decrease() {
    let stream = stream_from(&policy_config("drop_oldest", 4));

    let producer = {
        let stream = Arc::clone(&stream);

        tokio::spawn(async move {
            let ctx = Context::background();

            for index in 0..2000 {
                stream.write(&ctx, Token::new(index, "t")).await.unwrap();
            }

            stream.close();
        })
    };

    let reader = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { drain(&stream).await.len() })
    };

    let mut previous = stream.stats();
    while !reader.is_finished() {
        let current = stream.stats();

        assert!(current.read <= current.written);
        assert!(current.written >= previous.written);
        assert!(current.dropped >= previous.dropped);
        assert!(current.read >= previous.read);

        previous = current;
        tokio::task::yield_now().await;
    }

    producer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn close_releases_blocked_writer() {
    let stream = stream_from(&policy_config("block", 1));
    let ctx = Context::background();

    stream.write(&ctx, Token::new(0, "first")).await.unwrap();

    let blocked = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.write(&Context::background(), Token::new(1, "second")).await })
    };

    while stream.stats().blocked == 0 {
        tokio::task::yield_now().await;
    }

    stream.close();

    assert_eq!(blocked.await.unwrap(), Err(StreamError::Closed));
    assert_eq!(drain_contents(&stream).await, ["first"]);
}

#[tokio::test(start_paused = true)]
async fn blocked_writer_honours_deadline() {
    let stream = stream_from(&policy_config("block", 2));
    let ctx = Context::background();

    stream.write(&ctx, Token::new(0, "a")).await.unwrap();
    stream.write(&ctx, Token::new(1, "b")).await.unwrap();

    let deadline = ctx.with_timeout(Duration::from_millis(200));
    let result = stream.write(&deadline, Token::new(2, "c")).await;

    assert_eq!(result.unwrap_err().cancellation(), Some(llm::Cancellation::DeadlineExceeded));
    assert_eq!(stream.len(), 2);
}

#[tokio::test]
async fn flow_state_has_hysteresis() {
    let stream = stream_from(&policy_config("drop_newest", 8));
    let ctx = Context::background();

    for index in 0..6 {
        stream.write(&ctx, Token::new(index, "t")).await.unwrap();
    }
    assert_eq!(stream.flow_state(), FlowState::Throttled);

    // 6 -> 3 buffered: below high, still above low.
    for _ in 0..3 {
        stream.try_read().unwrap();
    }
    assert_eq!(stream.flow_state(), FlowState::Throttled);

    // 3 -> 2 buffered: at the low water mark.
    stream.try_read().unwrap();
    assert_eq!(stream.flow_state(), FlowState::Normal);
}

#[test]
fn invalid_watermarks_are_rejected_on_load() {
    let error = load_config(indoc! {r#"
        [streaming.backpressure]
        high_water_mark = 0.5
        low_water_mark = 0.6
    "#})
    .unwrap_err();

    insta::assert_snapshot!(error, @"streaming.backpressure.low_water_mark must be in (0, high_water_mark), got 0.6 with high_water_mark 0.5");
}

#[test]
fn default_policy_is_block() {
    let config = load_config("").unwrap();

    assert_eq!(config.streaming.backpressure.drop_policy, DropPolicy::Block);
    assert_eq!(config.streaming.backpressure.buffer_size, 1024);
}
