//! Bounded, watermark-gated token streams.

mod backpressure;
mod flow;
mod multiplexer;
mod paced;
mod stats;

pub use backpressure::BackpressureStream;
pub use flow::FlowState;
pub use multiplexer::StreamMultiplexer;
pub use paced::PacedWriter;
pub use stats::StreamStats;
