//! Default configuration constants for spectro.

use std::time::Duration;

/// Default bits per sample for binary PCM chunks.
pub const BITS_PER_SAMPLE: u32 = 16;

/// Only mono input is supported.
pub const CHANNELS: u16 = 1;

/// Default window size in samples.
pub const WINDOW_SIZE: usize = 1024;

/// Smallest accepted window size.
pub const MIN_WINDOW_SIZE: usize = 128;

/// Largest accepted window size.
pub const MAX_WINDOW_SIZE: usize = 4096;

/// Default overlap between consecutive windows (fraction of the window size).
pub const OVERLAP: f64 = 0.0;

/// Lowest amplitude emitted, in dB. Zero coefficients map here.
pub const DECIBEL_FLOOR: f64 = -200.0;

/// Default number of bytes handed to the engine per write by the CLI.
pub const CHUNK_SIZE: usize = 4096;

/// How long `stop()` waits for worker threads before detaching them.
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Default worker count: one per available CPU.
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_at_least_one() {
        assert!(worker_count() >= 1);
    }

    #[test]
    fn default_window_size_is_in_range() {
        assert!(WINDOW_SIZE.is_power_of_two());
        assert!((MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&WINDOW_SIZE));
    }
}
