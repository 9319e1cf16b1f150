use std::sync::Arc;

use config::PacingConfig;
use rate_limit::StreamRateLimiter;

use super::BackpressureStream;
use crate::context::Context;
use crate::error::StreamError;
use crate::token::Token;

/// Producer-side wrapper that paces writes into a [`BackpressureStream`].
///
/// Each write first waits for the token bucket, then for space in the stream.
/// Both waits end early when the context does.
#[derive(Clone)]
pub struct PacedWriter {
    stream: Arc<BackpressureStream>,
    limiter: Arc<StreamRateLimiter>,
}

impl PacedWriter {
    pub fn new(stream: Arc<BackpressureStream>, pacing: &PacingConfig) -> crate::Result<Self> {
        let limiter = StreamRateLimiter::new(pacing).map_err(|e| StreamError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            stream,
            limiter: Arc::new(limiter),
        })
    }

    pub async fn write(&self, ctx: &Context, token: Token) -> crate::Result<()> {
        if self.stream.is_closed() {
            return Err(StreamError::Closed);
        }

        ctx.run(self.limiter.until_ready()).await?;

        self.stream.write(ctx, token).await
    }

    /// Closes the underlying stream.
    pub fn close(&self) {
        self.stream.close();
    }

    pub fn stream(&self) -> &Arc<BackpressureStream> {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use config::{BackpressureConfig, DropPolicy};

    use super::*;
    use crate::error::Cancellation;

    fn stream() -> Arc<BackpressureStream> {
        let config = BackpressureConfig {
            buffer_size: 64,
            high_water_mark: 1.0,
            low_water_mark: 0.5,
            drop_policy: DropPolicy::Block,
        };

        Arc::new(BackpressureStream::new(config).unwrap())
    }

    #[tokio::test]
    async fn burst_passes_without_waiting() {
        let pacing = PacingConfig {
            tokens_per_second: 1,
            burst: 3,
        };
        let writer = PacedWriter::new(stream(), &pacing).unwrap();
        let ctx = Context::background();

        let started = Instant::now();
        for index in 0..3 {
            writer.write(&ctx, Token::new(index, "t")).await.unwrap();
        }

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(writer.stream().len(), 3);
    }

    #[tokio::test]
    async fn pacing_wait_honours_deadline() {
        let pacing = PacingConfig {
            tokens_per_second: 1,
            burst: 1,
        };
        let writer = PacedWriter::new(stream(), &pacing).unwrap();

        writer.write(&Context::background(), Token::new(0, "a")).await.unwrap();

        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let result = writer.write(&ctx, Token::new(1, "b")).await;

        assert_eq!(result, Err(StreamError::Cancelled(Cancellation::DeadlineExceeded)));
        assert_eq!(writer.stream().len(), 1);
    }

    #[tokio::test]
    async fn writes_are_spread_over_time() {
        let pacing = PacingConfig {
            tokens_per_second: 20,
            burst: 1,
        };
        let writer = PacedWriter::new(stream(), &pacing).unwrap();
        let ctx = Context::background();

        let started = Instant::now();
        for index in 0..3 {
            writer.write(&ctx, Token::new(index, "t")).await.unwrap();
        }

        // First token is free, the next two each wait one 50ms interval.
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let pacing = PacingConfig {
            tokens_per_second: 0,
            burst: 1,
        };

        let result = PacedWriter::new(stream(), &pacing);

        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn closed_stream_skips_pacing() {
        let writer = PacedWriter::new(
            stream(),
            &PacingConfig {
                tokens_per_second: 1,
                burst: 1,
            },
        )
        .unwrap();

        writer.close();

        let result = writer.write(&Context::background(), Token::new(0, "a")).await;
        assert_eq!(result, Err(StreamError::Closed));
    }
}
