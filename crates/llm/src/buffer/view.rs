use std::fmt;
use std::ops::{Deref, Range};
use std::str;

use bytes::Bytes;

use crate::error::BufferError;

/// Borrowed, UTF-8 checked view over bytes owned elsewhere.
///
/// Validation happens once in [`new`](Self::new); reading the text afterwards
/// costs nothing. The owner cannot be mutated or dropped while a view lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringView<'a> {
    text: &'a str,
}

impl<'a> StringView<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, BufferError> {
        Ok(Self {
            text: bytes_to_str(bytes)?,
        })
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Deref for StringView<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.text
    }
}

impl fmt::Display for StringView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text)
    }
}

/// Reinterprets `bytes` as text without copying.
pub fn bytes_to_str(bytes: &[u8]) -> Result<&str, BufferError> {
    Ok(str::from_utf8(bytes)?)
}

/// Reinterprets `text` as bytes without copying.
pub fn str_to_bytes(text: &str) -> &[u8] {
    text.as_bytes()
}

/// Reference-counted, immutable UTF-8 text.
///
/// Use this where a view has to outlive the buffer it was cut from. Cloning and
/// slicing share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteStr(Bytes);

impl ByteStr {
    pub fn from_utf8(bytes: Bytes) -> Result<Self, BufferError> {
        str::from_utf8(&bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: the bytes were validated as UTF-8 on construction, every slice
        // is cut on a character boundary, and `Bytes` is immutable.
        unsafe { str::from_utf8_unchecked(&self.0) }
    }

    /// A sub-slice sharing this allocation.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, BufferError> {
        let text = self.as_str();

        for offset in [range.start, range.end] {
            if !text.is_char_boundary(offset) {
                return Err(BufferError::NotCharBoundary(offset));
            }
        }

        if range.start > range.end {
            return Err(BufferError::OutOfBounds {
                requested: range.start,
                available: range.end,
            });
        }

        Ok(Self(self.0.slice(range)))
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for ByteStr {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for ByteStr {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

impl Deref for ByteStr {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ByteStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
