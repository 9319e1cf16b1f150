use thiserror::Error;

/// Failure reported by the remote side of a streaming call.
///
/// Carried in-band on the final [`Token`] so that it reaches the consumer after
/// every token that was delivered before the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The provider API answered with an error status.
    #[error("Provider API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Message returned by the provider.
        message: String,
    },

    /// The provider reported an error inside the stream body.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The byte stream broke off.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The bytes could not be decoded into tokens.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// One incremental unit of streamed model output.
///
/// Tokens are immutable once built. A token carrying an [`UpstreamError`] is the
/// last one a well-behaved producer writes; consumers stop reading on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    content: String,
    index: u64,
    error: Option<UpstreamError>,
}

impl Token {
    /// A content token at the given producer position.
    pub fn new(index: u64, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            index,
            error: None,
        }
    }

    /// A terminal token marking end-of-stream by failure.
    pub fn failed(index: u64, error: UpstreamError) -> Self {
        Self {
            content: String::new(),
            index,
            error: Some(error),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn error(&self) -> Option<&UpstreamError> {
        self.error.as_ref()
    }

    /// Whether this token ends the stream with a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Takes the text out of the token.
    pub fn into_content(self) -> String {
        self.content
    }
}
