//! Server-Sent Events framing for provider byte streams.

mod parser;

pub use parser::{SseFrame, SseFramer};
