//! Append-only sample storage read by the window scheduler.

use crate::audio::chunk::{BitDepth, Chunk};
use crate::error::Result;

/// Growing sequence of decoded samples.
///
/// Samples are only ever appended during a run, so an index stays valid
/// until [`clear`](SampleBuffer::clear).
#[derive(Debug, Default, Clone)]
pub struct SampleBuffer {
    samples: Vec<f64>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` and appends it; on error the buffer is unchanged.
    ///
    /// Returns the number of samples appended.
    pub fn ingest(&mut self, chunk: Chunk, depth: BitDepth) -> Result<usize> {
        let decoded = chunk.decode(depth)?;
        let appended = decoded.len();
        self.samples.extend(decoded);
        Ok(appended)
    }

    pub fn extend_from_slice(&mut self, samples: &[f64]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `len` samples starting at `start`, if all of them are buffered.
    pub fn window(&self, start: usize, len: usize) -> Option<&[f64]> {
        self.samples.get(start..start.checked_add(len)?)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
