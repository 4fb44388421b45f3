//! Audio input: chunk decoding, the sample buffer and WAV reading.

pub mod chunk;
pub mod sample_buffer;
pub mod wav;

pub use chunk::{BitDepth, Chunk};
pub use sample_buffer::SampleBuffer;
pub use wav::WavInput;
