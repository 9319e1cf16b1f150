use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::time::Instant;

use super::flow::FlowState;

/// Point-in-time statistics of a [`BackpressureStream`](super::BackpressureStream).
///
/// `written`, `dropped`, `read` and `blocked` never decrease, and `read <= written`
/// holds for every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Tokens enqueued.
    pub written: u64,
    /// Tokens shed by the drop policy, either evicted or discarded on arrival.
    pub dropped: u64,
    /// Tokens handed to the consumer.
    pub read: u64,
    /// Writes that had to wait for the consumer to free space.
    pub blocked: u64,
    /// Tokens queued at snapshot time.
    pub buffered: usize,
    /// Queue capacity.
    pub capacity: usize,
    /// Throttling state at snapshot time.
    pub flow_state: FlowState,
    /// When a token was last enqueued.
    pub last_write: Option<Instant>,
    /// When a token was last handed to the consumer.
    pub last_read: Option<Instant>,
}

pub(super) struct Counters {
    written: AtomicU64,
    dropped: AtomicU64,
    read: AtomicU64,
    blocked: AtomicU64,
    buffered: AtomicUsize,
    origin: Instant,
    last_write: Timestamp,
    last_read: Timestamp,
}

impl Counters {
    pub(super) fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            read: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            buffered: AtomicUsize::new(0),
            origin: Instant::now(),
            last_write: Timestamp::default(),
            last_read: Timestamp::default(),
        }
    }

    pub(super) fn record_write(&self) {
        self.last_write.touch(self.origin);
        self.written.fetch_add(1, Ordering::Release);
    }

    pub(super) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Release);
    }

    pub(super) fn record_read(&self) {
        self.last_read.touch(self.origin);
        self.read.fetch_add(1, Ordering::Release);
    }

    pub(super) fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Release);
    }

    pub(super) fn set_buffered(&self, buffered: usize) {
        self.buffered.store(buffered, Ordering::Release);
    }

    pub(super) fn snapshot(&self, capacity: usize, flow_state: FlowState) -> StreamStats {
        // Every read is preceded by the write that enqueued the token, so loading
        // `read` before `written` keeps `read <= written` without a lock.
        let read = self.read.load(Ordering::Acquire);
        let dropped = self.dropped.load(Ordering::Acquire);
        let blocked = self.blocked.load(Ordering::Acquire);
        let buffered = self.buffered.load(Ordering::Acquire);
        let written = self.written.load(Ordering::Acquire);

        StreamStats {
            written,
            dropped,
            read,
            blocked,
            buffered,
            capacity,
            flow_state,
            last_write: self.last_write.get(self.origin),
            last_read: self.last_read.get(self.origin),
        }
    }
}

/// An optional instant stored as nanoseconds past an origin, offset by one so that
/// zero means "never".
#[derive(Default)]
struct Timestamp(AtomicU64);

impl Timestamp {
    fn touch(&self, origin: Instant) {
        let nanos = u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX - 1);
        self.0.fetch_max(nanos.saturating_add(1), Ordering::Release);
    }

    fn get(&self, origin: Instant) -> Option<Instant> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            nanos => origin.checked_add(std::time::Duration::from_nanos(nanos - 1)),
        }
    }
}
