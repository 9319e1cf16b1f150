use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use config::{BackpressureConfig, DropPolicy};
use futures::Stream;
use tokio::sync::Notify;

use super::flow::{FlowControl, FlowState};
use super::stats::{Counters, StreamStats};
use crate::context::Context;
use crate::error::StreamError;
use crate::token::Token;

/// Bounded token queue between one streaming call and its consumer.
///
/// Any number of producers may write concurrently; one consumer reads. Below the
/// high water mark writes are enqueued immediately. At or above it the configured
/// [`DropPolicy`] decides: wait for space, evict the oldest token, discard the
/// incoming token, or reject the write.
///
/// The queue, the closed flag and the counters are only mutated inside one short
/// critical section, so an eviction and the enqueue that follows it can never be
/// split by another writer. Suspension happens outside the lock, on [`Notify`]
/// wakeups, and is always bounded by the caller's [`Context`].
pub struct BackpressureStream {
    config: BackpressureConfig,
    state: Mutex<State>,
    not_empty: Notify,
    not_full: Notify,
    counters: Counters,
    flow: FlowControl,
}

struct State {
    queue: VecDeque<Token>,
    closed: bool,
}

enum Enqueue {
    Accepted,
    Discarded,
    Full(Token),
}

impl BackpressureStream {
    /// Creates an open, empty stream.
    pub fn new(config: BackpressureConfig) -> crate::Result<Self> {
        config
            .validate()
            .map_err(|e| StreamError::InvalidConfig(e.to_string()))?;

        log::debug!(
            "Creating backpressure stream: buffer_size={}, high_water_mark={}, low_water_mark={}, drop_policy={:?}",
            config.buffer_size,
            config.high_water_mark,
            config.low_water_mark,
            config.drop_policy
        );

        Ok(Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(config.buffer_size),
                closed: false,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            counters: Counters::new(),
            flow: FlowControl::new(config.high_water_mark, config.low_water_mark),
            config,
        })
    }

    /// Writes one token, applying the drop policy at the high water mark.
    ///
    /// Returns the context cause if `ctx` ends before the token is accepted, in which
    /// case the queue is left untouched. Fails with [`StreamError::Closed`] once the
    /// stream is closed, including for writers that were waiting when it closed.
    pub async fn write(&self, ctx: &Context, token: Token) -> crate::Result<()> {
        if let Some(cause) = ctx.cause() {
            return Err(cause.into());
        }

        let mut pending = token;
        let mut waited = false;

        loop {
            // Register for wakeups before inspecting the queue so a read or close
            // landing between the check and the wait is not missed.
            let mut space = pin!(self.not_full.notified());
            space.as_mut().enable();

            match self.try_enqueue(pending)? {
                Enqueue::Accepted | Enqueue::Discarded => return Ok(()),
                Enqueue::Full(token) => pending = token,
            }

            if !waited {
                waited = true;
                self.counters.record_blocked();
            }

            tokio::select! {
                biased;
                cause = ctx.done() => return Err(cause.into()),
                () = space => {}
            }
        }
    }

    /// Reads the next token, waiting for one if the queue is empty.
    ///
    /// Fails with [`StreamError::EndOfStream`] once the stream is closed and drained.
    pub async fn read(&self, ctx: &Context) -> crate::Result<Token> {
        if let Some(cause) = ctx.cause() {
            return Err(cause.into());
        }

        loop {
            let mut data = pin!(self.not_empty.notified());
            data.as_mut().enable();

            if let Some(token) = self.try_read()? {
                return Ok(token);
            }

            tokio::select! {
                biased;
                cause = ctx.done() => return Err(cause.into()),
                () = data => {}
            }
        }
    }

    /// Takes the next token if one is queued, without waiting.
    pub fn try_read(&self) -> crate::Result<Option<Token>> {
        let mut state = self.lock();

        let Some(token) = state.queue.pop_front() else {
            return if state.closed {
                Err(StreamError::EndOfStream)
            } else {
                Ok(None)
            };
        };

        self.counters.record_read();
        self.observe(&state);
        drop(state);

        self.not_full.notify_one();

        Ok(Some(token))
    }

    /// Iterates the stream until it is drained.
    ///
    /// The iteration ends after the last buffered token of a closed stream, right
    /// after a token carrying an upstream error, or after yielding the context cause.
    pub fn tokens(self: &Arc<Self>, ctx: Context) -> impl Stream<Item = crate::Result<Token>> + Send + 'static {
        futures::stream::unfold(Some((Arc::clone(self), ctx)), |state| async move {
            let (stream, ctx) = state?;

            match stream.read(&ctx).await {
                Ok(token) if token.is_error() => Some((Ok(token), None)),
                Ok(token) => Some((Ok(token), Some((stream, ctx)))),
                Err(StreamError::EndOfStream) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Closes the stream. Idempotent.
    ///
    /// Later writes fail with [`StreamError::Closed`]; buffered tokens still drain.
    pub fn close(&self) {
        let mut state = self.lock();

        if state.closed {
            return;
        }

        state.closed = true;
        let buffered = state.queue.len();
        drop(state);

        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();

        log::debug!("Backpressure stream closed with {buffered} tokens still buffered");
    }

    /// Appends a terminal failure token and closes the stream in one step.
    ///
    /// The failure must reach the consumer whatever the drop policy says, so when
    /// the queue is full the oldest token is evicted to make room for it.
    pub fn close_with_error(&self, token: Token) -> crate::Result<()> {
        let mut state = self.lock();

        if state.closed {
            return Err(StreamError::Closed);
        }

        if state.queue.len() >= self.config.buffer_size && state.queue.pop_front().is_some() {
            self.counters.record_drop();
        }

        log::debug!("Closing stream with upstream failure at index {}", token.index());

        state.queue.push_back(token);
        state.closed = true;
        self.counters.record_write();
        self.observe(&state);
        drop(state);

        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();

        Ok(())
    }

    /// Lock-free snapshot of the statistics.
    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot(self.config.buffer_size, self.flow.state())
    }

    /// Number of queued tokens.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.config.buffer_size
    }

    /// Current occupancy as a fraction of capacity.
    pub fn buffer_level(&self) -> f64 {
        self.len() as f64 / self.config.buffer_size as f64
    }

    pub fn flow_state(&self) -> FlowState {
        self.flow.state()
    }

    /// Whether a producer should hold off, following the watermark hysteresis.
    pub fn is_throttled(&self) -> bool {
        self.flow.state() == FlowState::Throttled
    }

    pub fn config(&self) -> &BackpressureConfig {
        &self.config
    }

    fn try_enqueue(&self, token: Token) -> crate::Result<Enqueue> {
        let mut state = self.lock();

        if state.closed {
            return Err(StreamError::Closed);
        }

        let capacity = self.config.buffer_size;
        let level = state.queue.len() as f64 / capacity as f64;

        let outcome = if level < self.config.high_water_mark {
            state.queue.push_back(token);
            Enqueue::Accepted
        } else {
            match self.config.drop_policy {
                DropPolicy::Block if state.queue.len() < capacity => {
                    state.queue.push_back(token);
                    Enqueue::Accepted
                }
                DropPolicy::Block => Enqueue::Full(token),
                DropPolicy::DropOldest => {
                    if let Some(evicted) = state.queue.pop_front() {
                        self.counters.record_drop();
                        log::trace!("Evicted token {} to make room for {}", evicted.index(), token.index());
                    }

                    state.queue.push_back(token);
                    Enqueue::Accepted
                }
                DropPolicy::DropNewest if state.queue.len() >= capacity => {
                    self.counters.record_drop();
                    log::trace!("Discarded incoming token {}", token.index());
                    Enqueue::Discarded
                }
                DropPolicy::DropNewest => {
                    state.queue.push_back(token);
                    Enqueue::Accepted
                }
                DropPolicy::Reject => return Err(StreamError::BufferFull),
            }
        };

        if let Enqueue::Accepted = outcome {
            self.counters.record_write();
            self.observe(&state);
            drop(state);

            self.not_empty.notify_one();
        }

        Ok(outcome)
    }

    fn observe(&self, state: &State) {
        let buffered = state.queue.len();

        self.counters.set_buffered(buffered);
        self.flow.observe(buffered as f64 / self.config.buffer_size as f64);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // No code path panics while holding the lock, so a poisoned queue is intact.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BackpressureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackpressureStream")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for BackpressureStream {
    fn drop(&mut self) {
        crate::metrics::record_stream(&self.stats(), self.config.drop_policy);
    }
}
