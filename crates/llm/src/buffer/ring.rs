use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Fixed-capacity single-producer single-consumer byte ring.
///
/// The capacity is a power of two so a slot index is the cursor masked by
/// `capacity - 1`. Both cursors wrap around `usize` and only their difference
/// matters, which stays within `0..=capacity`.
///
/// Mutation takes `&mut self`, so one owner drives both ends. Use
/// [`split`](Self::split) to hand the ends to different threads.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[u8]>,
    mask: usize,
    read_idx: usize,
    write_idx: usize,
}

impl RingBuffer {
    /// A ring holding `size` bytes rounded up to a power of two, at least one.
    pub fn new(size: usize) -> Self {
        let capacity = size.max(1).next_power_of_two();

        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            mask: capacity - 1,
            read_idx: 0,
            write_idx: 0,
        }
    }

    /// Stores one byte. Returns `false` when the ring is full.
    pub fn put(&mut self, byte: u8) -> bool {
        if self.free() == 0 {
            return false;
        }

        self.slots[self.write_idx & self.mask] = byte;
        self.write_idx = self.write_idx.wrapping_add(1);

        true
    }

    /// Takes the oldest byte, or `None` when the ring is empty.
    pub fn get(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }

        let byte = self.slots[self.read_idx & self.mask];
        self.read_idx = self.read_idx.wrapping_add(1);

        Some(byte)
    }

    /// Stores as many leading bytes of `data` as fit. Returns how many were stored.
    pub fn put_slice(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());

        for &byte in &data[..n] {
            self.slots[self.write_idx & self.mask] = byte;
            self.write_idx = self.write_idx.wrapping_add(1);
        }

        n
    }

    /// Fills `dst` with the oldest bytes. Returns how many were taken.
    pub fn get_slice(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.available());

        for slot in &mut dst[..n] {
            *slot = self.slots[self.read_idx & self.mask];
            self.read_idx = self.read_idx.wrapping_add(1);
        }

        n
    }

    /// Bytes ready to be read.
    pub fn available(&self) -> usize {
        self.write_idx.wrapping_sub(self.read_idx)
    }

    /// Bytes that can be written before the ring is full.
    pub fn free(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Splits the ring into ends that can live on different threads.
    ///
    /// Unread bytes carry over to the consumer.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let shared = Arc::new(Shared {
            slots: self.slots.iter().copied().map(AtomicU8::new).collect(),
            mask: self.mask,
            read_idx: AtomicUsize::new(self.read_idx),
            write_idx: AtomicUsize::new(self.write_idx),
        });

        (
            RingProducer {
                shared: Arc::clone(&shared),
            },
            RingConsumer { shared },
        )
    }
}

#[derive(Debug)]
struct Shared {
    slots: Box<[AtomicU8]>,
    mask: usize,
    read_idx: AtomicUsize,
    write_idx: AtomicUsize,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Writing end of a split [`RingBuffer`].
#[derive(Debug)]
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Stores one byte. Returns `false` when the ring is full.
    pub fn put(&mut self, byte: u8) -> bool {
        self.put_slice(&[byte]) == 1
    }

    /// Stores as many leading bytes of `data` as fit and publishes them at once.
    pub fn put_slice(&mut self, data: &[u8]) -> usize {
        let shared = &*self.shared;

        // Only this end moves write_idx.
        let write = shared.write_idx.load(Ordering::Relaxed);
        let read = shared.read_idx.load(Ordering::Acquire);

        let free = shared.capacity() - write.wrapping_sub(read);
        let n = data.len().min(free);

        for (offset, &byte) in data[..n].iter().enumerate() {
            shared.slots[write.wrapping_add(offset) & shared.mask].store(byte, Ordering::Relaxed);
        }

        shared.write_idx.store(write.wrapping_add(n), Ordering::Release);

        n
    }

    pub fn free(&self) -> usize {
        let write = self.shared.write_idx.load(Ordering::Relaxed);
        let read = self.shared.read_idx.load(Ordering::Acquire);

        self.shared.capacity() - write.wrapping_sub(read)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Reading end of a split [`RingBuffer`].
#[derive(Debug)]
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    /// Takes the oldest byte, or `None` when the ring is empty.
    pub fn get(&mut self) -> Option<u8> {
        let mut byte = [0];
        (self.get_slice(&mut byte) == 1).then_some(byte[0])
    }

    /// Fills `dst` with the oldest bytes and releases their slots at once.
    pub fn get_slice(&mut self, dst: &mut [u8]) -> usize {
        let shared = &*self.shared;

        // Only this end moves read_idx.
        let read = shared.read_idx.load(Ordering::Relaxed);
        let write = shared.write_idx.load(Ordering::Acquire);

        let n = dst.len().min(write.wrapping_sub(read));

        for (offset, slot) in dst[..n].iter_mut().enumerate() {
            *slot = shared.slots[read.wrapping_add(offset) & shared.mask].load(Ordering::Relaxed);
        }

        shared.read_idx.store(read.wrapping_add(n), Ordering::Release);

        n
    }

    pub fn available(&self) -> usize {
        let read = self.shared.read_idx.load(Ordering::Relaxed);
        let write = self.shared.write_idx.load(Ordering::Acquire);

        write.wrapping_sub(read)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}
