use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use config::{BackpressureConfig, FanoutConfig};
use tokio::task::JoinHandle;

use super::BackpressureStream;
use crate::context::Context;
use crate::error::{Cancellation, StreamError};
use crate::token::Token;

/// Fans one source stream out to several consumer streams.
///
/// Each consumer has its own [`BackpressureConfig`], so one consumer may shed
/// tokens while another waits for them. A consumer that cannot accept a token
/// within the slow-consumer timeout is closed and detached so it cannot stall
/// the others. When the source ends, or the context does, every consumer is
/// closed and drains what it already holds.
pub struct StreamMultiplexer {
    source: Arc<BackpressureStream>,
    consumers: Mutex<Vec<Consumer>>,
    next_id: AtomicUsize,
    slow_consumer_timeout: Duration,
    running: AtomicBool,
}

#[derive(Clone)]
struct Consumer {
    id: usize,
    stream: Arc<BackpressureStream>,
}

impl StreamMultiplexer {
    pub fn new(source: Arc<BackpressureStream>, fanout: &FanoutConfig) -> Self {
        Self {
            source,
            consumers: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            slow_consumer_timeout: fanout.slow_consumer_timeout,
            running: AtomicBool::new(false),
        }
    }

    /// Attaches a new consumer. Tokens read from the source afterwards reach it.
    pub fn add_consumer(&self, config: BackpressureConfig) -> crate::Result<Arc<BackpressureStream>> {
        let stream = Arc::new(BackpressureStream::new(config)?);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock().push(Consumer {
            id,
            stream: Arc::clone(&stream),
        });

        log::debug!("Attached stream consumer {id}");

        Ok(stream)
    }

    /// Number of consumers still attached.
    pub fn consumer_count(&self) -> usize {
        self.lock().len()
    }

    /// Spawns the fan-out loop. Returns `None` if it is already running.
    pub fn start(self: &Arc<Self>, ctx: Context) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }

        let this = Arc::clone(self);

        Some(tokio::spawn(async move {
            this.run(&ctx).await;
        }))
    }

    /// Forwards every source token to the consumers until the source or `ctx` ends.
    pub async fn run(&self, ctx: &Context) {
        loop {
            match self.source.read(ctx).await {
                Ok(token) => self.broadcast(ctx, token).await,
                Err(StreamError::EndOfStream) => {
                    log::debug!("Multiplexer source drained");
                    break;
                }
                Err(e) => {
                    log::debug!("Multiplexer stopped: {e}");
                    break;
                }
            }
        }

        self.close_all();
    }

    async fn broadcast(&self, ctx: &Context, token: Token) {
        let consumers = self.lock().clone();

        let writes = consumers.iter().map(|consumer| {
            let write_ctx = ctx.with_timeout(self.slow_consumer_timeout);
            let token = token.clone();

            async move { (consumer, consumer.stream.write(&write_ctx, token).await) }
        });

        for (consumer, result) in futures::future::join_all(writes).await {
            match result {
                Ok(()) => {}
                Err(StreamError::Cancelled(Cancellation::DeadlineExceeded)) if ctx.cause().is_none() => {
                    log::warn!(
                        "Detaching stream consumer {} after {:?} without accepting token {}",
                        consumer.id,
                        self.slow_consumer_timeout,
                        token.index()
                    );
                    self.detach(consumer.id);
                }
                Err(StreamError::Closed) => {
                    log::debug!("Stream consumer {} was closed by its owner", consumer.id);
                    self.detach(consumer.id);
                }
                Err(StreamError::BufferFull) => {
                    log::debug!("Stream consumer {} rejected token {}", consumer.id, token.index());
                }
                Err(e) => {
                    log::debug!("Broadcast to stream consumer {} interrupted: {e}", consumer.id);
                }
            }
        }
    }

    fn detach(&self, id: usize) {
        let mut consumers = self.lock();

        if let Some(position) = consumers.iter().position(|consumer| consumer.id == id) {
            let consumer = consumers.remove(position);
            drop(consumers);

            consumer.stream.close();
        }
    }

    fn close_all(&self) {
        let consumers = std::mem::take(&mut *self.lock());

        for consumer in &consumers {
            consumer.stream.close();
        }

        self.running.store(false, Ordering::Release);
        log::debug!("Closed {} stream consumers", consumers.len());
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Consumer>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
