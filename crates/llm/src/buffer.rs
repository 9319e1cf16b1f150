//! Byte buffers that hand out borrowed views instead of copies.

mod chunk;
mod ring;
mod view;
mod zero_copy;

pub use chunk::ChunkReader;
pub use ring::{RingBuffer, RingConsumer, RingProducer};
pub use view::{ByteStr, StringView, bytes_to_str, str_to_bytes};
pub use zero_copy::ZeroCopyBuffer;
