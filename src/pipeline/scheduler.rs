//! Decides when the next window can be cut and assigns its index.

use crate::audio::sample_buffer::SampleBuffer;
use crate::dsp::window::WindowFunction;
use crate::pipeline::types::WindowJob;

/// Shift cursor and index counter of one run.
#[derive(Debug, Clone)]
pub struct WindowScheduler {
    window_size: usize,
    hop: usize,
    window_function: WindowFunction,
    shift: usize,
    next_index: u64,
}

impl WindowScheduler {
    /// `hop` is the shift cursor advance per window and must be at least 1.
    pub fn new(window_size: usize, hop: usize, window_function: WindowFunction) -> Self {
        Self {
            window_size,
            hop,
            window_function,
            shift: 0,
            next_index: 0,
        }
    }

    /// True when `[shift, shift + W)` is fully buffered.
    pub fn can_cut(&self, buffered: usize) -> bool {
        self.shift
            .checked_add(self.window_size)
            .is_some_and(|end| end <= buffered)
    }

    /// Cuts the next window and advances the cursor, if enough samples exist.
    pub fn cut(&mut self, buffer: &SampleBuffer) -> Option<WindowJob> {
        let samples = buffer.window(self.shift, self.window_size)?;
        let job = WindowJob::new(self.next_index, samples.to_vec(), self.window_function);

        self.next_index += 1;
        self.shift += self.hop;
        Some(job)
    }

    /// Next start offset into the sample buffer.
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Number of jobs cut so far; also the next index to be assigned.
    pub fn dispatched(&self) -> u64 {
        self.next_index
    }

    /// Back to the state before the first cut.
    pub fn reset(&mut self) {
        self.shift = 0;
        self.next_index = 0;
    }
}
