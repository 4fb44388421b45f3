//! Spectral transform boundary and the default DCT-II implementation.

use crate::error::{Result, SpectroError};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Real-sequence-to-real-sequence transform run by every worker.
///
/// Implementations must be pure and deterministic: the output has the same
/// length as the input and depends on nothing else. One instance is shared
/// by all workers of a spectrogram.
pub trait SpectralTransform: Send + Sync {
    /// Transforms one windowed frame.
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>>;

    /// Frame length this transform was planned for.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Unnormalised type-II discrete cosine transform with scale 2:
///
/// ```text
/// X_k = 2 * sum_{n=0}^{N-1} x_n * cos(pi/N * (n + 0.5) * k)
/// ```
///
/// Computed in O(N log N) by reordering the input, running a complex FFT of
/// the same length and rotating each bin by `exp(-i*pi*k / 2N)`.
pub struct Dct2 {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
    twiddles: Vec<Complex<f64>>,
}

impl Dct2 {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let twiddles = (0..len)
            .map(|k| Complex::from_polar(2.0, -PI * k as f64 / (2 * len) as f64))
            .collect();

        Self { len, fft, twiddles }
    }
}

impl SpectralTransform for Dct2 {
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.len {
            return Err(SpectroError::Transform {
                message: format!(
                    "expected {} samples, got {}",
                    self.len,
                    input.len()
                ),
            });
        }
        if self.len == 0 {
            return Ok(Vec::new());
        }

        // Even samples ascending, then odd samples descending.
        let half = self.len.div_ceil(2);
        let mut buffer: Vec<Complex<f64>> = (0..self.len)
            .map(|n| {
                let source = if n < half {
                    2 * n
                } else {
                    2 * (self.len - 1 - n) + 1
                };
                Complex::new(input[source], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        Ok(buffer
            .iter()
            .zip(&self.twiddles)
            .map(|(bin, twiddle)| (bin * twiddle).re)
            .collect())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn name(&self) -> &str {
        "dct2"
    }
}

/// Converts a transform coefficient to `20 * log10(|c|)`.
///
/// Zero and non-finite results saturate at `floor`.
pub fn to_decibels(coefficient: f64, floor: f64) -> f64 {
    let db = 20.0 * coefficient.abs().log10();
    if !db.is_finite() || db < floor {
        floor
    } else {
        db
    }
}

/// Centre frequency in Hz of DCT bin `k` for a window of `window_size` samples.
pub fn bin_frequency(k: usize, window_size: usize, sample_rate: u32) -> f64 {
    k as f64 * sample_rate as f64 / (2 * window_size) as f64
}
