use thiserror::Error;

use crate::token::UpstreamError;

/// Why a [`Context`](crate::Context) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancellation {
    /// The context, or one of its parents, was cancelled explicitly.
    #[error("context cancelled")]
    Cancelled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors returned by backpressure stream operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The caller's context ended before the operation completed.
    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    /// A write was attempted on a closed stream.
    #[error("stream closed")]
    Closed,

    /// The stream is closed and every buffered token has been read.
    #[error("end of stream")]
    EndOfStream,

    /// The queue is at its high water mark and the drop policy rejects writes.
    #[error("buffer full, backpressure applied")]
    BufferFull,

    /// The stream configuration violates its invariants.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),
}

impl StreamError {
    /// The context cause, if this error comes from cancellation.
    pub fn cancellation(&self) -> Option<Cancellation> {
        match self {
            Self::Cancelled(cause) => Some(*cause),
            _ => None,
        }
    }

    /// Whether the error signals the regular end of a stream's life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::EndOfStream)
    }
}

/// Errors from the zero-copy buffer primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A chunk reader needs a chunk size of at least one byte.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// Tried to consume more bytes than are unread.
    #[error("cannot consume {requested} bytes, only {available} unread")]
    OutOfBounds {
        /// Bytes the caller asked for.
        requested: usize,
        /// Bytes actually unread.
        available: usize,
    },

    /// The bytes are not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A slice boundary falls inside a multi-byte character.
    #[error("byte offset {0} is not on a character boundary")]
    NotCharBoundary(usize),
}

/// Errors from the provider layer.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Model names must look like `provider/model`.
    #[error("Invalid model format: expected 'provider/model', got '{0}'")]
    InvalidModelFormat(String),

    /// No provider is registered under this name.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// The provider failed before the stream could be created.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A stream operation failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}
