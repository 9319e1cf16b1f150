use std::num::NonZeroUsize;
use std::slice;

use crate::error::BufferError;

/// Splits a byte slice into fixed-size borrowed chunks.
///
/// Every chunk but the last is exactly `chunk_size` bytes long. Chunks are
/// produced lazily and can be walked again with [`iter`](Self::iter).
#[derive(Debug, Clone, Copy)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    chunk_size: NonZeroUsize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8], chunk_size: usize) -> Result<Self, BufferError> {
        let chunk_size = NonZeroUsize::new(chunk_size).ok_or(BufferError::ZeroChunkSize)?;

        Ok(Self { data, chunk_size })
    }

    pub fn iter(&self) -> slice::Chunks<'a, u8> {
        self.data.chunks(self.chunk_size.get())
    }

    /// Number of chunks the data splits into.
    pub fn len(&self) -> usize {
        self.data.len().div_ceil(self.chunk_size.get())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> IntoIterator for ChunkReader<'a> {
    type Item = &'a [u8];
    type IntoIter = slice::Chunks<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &ChunkReader<'a> {
    type Item = &'a [u8];
    type IntoIter = slice::Chunks<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
