use std::io;

use bytes::Bytes;

use crate::error::BufferError;

/// Growable byte buffer with separate read and write cursors.
///
/// Unread bytes are exposed as a borrowed slice through [`bytes`](Self::bytes),
/// so callers can parse in place and only [`consume`](Self::consume) what they
/// used. The borrow checker keeps the slice from outliving the next mutation.
#[derive(Debug, Default, Clone)]
pub struct ZeroCopyBuffer {
    store: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl ZeroCopyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Appends `data`, growing the store if needed. Returns the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let needed = self.write_pos + data.len();

        if needed > self.store.len() {
            let grown = needed.max(self.store.len() * 2);
            self.store.resize(grown, 0);
        }

        self.store[self.write_pos..needed].copy_from_slice(data);
        self.write_pos = needed;

        data.len()
    }

    /// Copies unread bytes into `dst`. Returns 0 once every byte has been read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.len());

        dst[..n].copy_from_slice(&self.store[self.read_pos..self.read_pos + n]);
        self.read_pos += n;

        n
    }

    /// The unread bytes, without copying.
    pub fn bytes(&self) -> &[u8] {
        &self.store[self.read_pos..self.write_pos]
    }

    /// Marks `n` unread bytes as read.
    pub fn consume(&mut self, n: usize) -> Result<(), BufferError> {
        let available = self.len();

        if n > available {
            return Err(BufferError::OutOfBounds {
                requested: n,
                available,
            });
        }

        self.read_pos += n;
        Ok(())
    }

    /// Copies the first `n` unread bytes out and consumes them.
    ///
    /// The frame lives on its own, independent of later growth of this buffer.
    pub fn split_frame(&mut self, n: usize) -> Result<Bytes, BufferError> {
        let frame = self
            .bytes()
            .get(..n)
            .map(Bytes::copy_from_slice)
            .ok_or(BufferError::OutOfBounds {
                requested: n,
                available: self.len(),
            })?;

        self.read_pos += n;
        Ok(frame)
    }

    /// Moves the unread bytes to the front of the store.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }

        self.store.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }

    /// Rewinds both cursors. The storage is kept for reuse.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }
}

impl io::Write for ZeroCopyBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ZeroCopyBuffer::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ZeroCopyBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(ZeroCopyBuffer::read(self, buf))
    }
}
