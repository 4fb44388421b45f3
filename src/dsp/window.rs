//! Window functions applied to each frame before the transform.

use crate::error::SpectroError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Weighting curve multiplied sample-wise into a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindowFunction {
    Square,
    VonHann,
    #[default]
    Hamming,
    Blackman,
    BlackmanHarris,
    BlackmanNuttall,
    Bartlett,
}

impl WindowFunction {
    /// Every supported window function.
    pub const ALL: [WindowFunction; 7] = [
        WindowFunction::Square,
        WindowFunction::Hamming,
        WindowFunction::VonHann,
        WindowFunction::Blackman,
        WindowFunction::BlackmanHarris,
        WindowFunction::BlackmanNuttall,
        WindowFunction::Bartlett,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WindowFunction::Square => "Square",
            WindowFunction::VonHann => "VonHann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
            WindowFunction::BlackmanHarris => "BlackmanHarris",
            WindowFunction::BlackmanNuttall => "BlackmanNuttall",
            WindowFunction::Bartlett => "Bartlett",
        }
    }

    /// Weight of sample `n` in a window of length `m`.
    pub fn coefficient(self, n: usize, m: usize) -> f64 {
        let n = n as f64;
        let span = m as f64 - 1.0;
        let phase = 2.0 * PI * n / span;

        match self {
            WindowFunction::Square => 1.0,
            WindowFunction::VonHann => 0.5 * (1.0 - phase.cos()),
            WindowFunction::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowFunction::Blackman => {
                let alpha = 0.16;
                let a0 = (1.0 - alpha) / 2.0;
                let a1 = 0.5;
                let a2 = alpha / 2.0;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            }
            WindowFunction::BlackmanHarris => {
                four_term(phase, [0.35875, 0.48829, 0.14128, 0.01168])
            }
            WindowFunction::BlackmanNuttall => {
                four_term(phase, [0.3635819, 0.4891775, 0.1365995, 0.0106411])
            }
            WindowFunction::Bartlett => (2.0 / span) * (span / 2.0 - (n - span / 2.0).abs()),
        }
    }

    /// Full weight table for a window of length `m`.
    pub fn coefficients(self, m: usize) -> Vec<f64> {
        (0..m).map(|n| self.coefficient(n, m)).collect()
    }

    /// Multiplies the weights into `samples` in place.
    pub fn apply(self, samples: &mut [f64]) {
        let m = samples.len();
        if self == WindowFunction::Square {
            return;
        }
        for (n, sample) in samples.iter_mut().enumerate() {
            *sample *= self.coefficient(n, m);
        }
    }
}

fn four_term(phase: f64, [a0, a1, a2, a3]: [f64; 4]) -> f64 {
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos() - a3 * (3.0 * phase).cos()
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowFunction {
    type Err = SpectroError;

    /// Accepts the canonical names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WindowFunction::ALL
            .into_iter()
            .find(|w| w.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SpectroError::UnknownWindowFunction {
                name: wanted.to_string(),
            })
    }
}
