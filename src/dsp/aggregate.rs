//! Whole-spectrogram queries: amplitude extrema and IQR outlier clipping.

use crate::pipeline::types::Spectrum;
use serde::Serialize;

/// Clipping bounds derived from the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Largest amplitude over every value of the spectrogram.
pub fn max_amplitude(spectra: &[Spectrum]) -> Option<f64> {
    spectra.iter().flatten().copied().reduce(f64::max)
}

/// Smallest amplitude over every value of the spectrogram.
pub fn min_amplitude(spectra: &[Spectrum]) -> Option<f64> {
    spectra.iter().flatten().copied().reduce(f64::min)
}

/// Computes the IQR clipping bounds without modifying anything.
///
/// Quartiles are picked directly from the sorted values:
/// `q1 = v[floor(len / 4)]`, `q3 = v[ceil(3 * len / 4)]` (clamped to the
/// last value). Values are clipped below `q1 - 1.5 * iqr` and above
/// `q3 + 1.5 * iqr`.
pub fn iqr_bounds(spectra: &[Spectrum]) -> Option<IqrBounds> {
    let mut values: Vec<f64> = spectra.iter().flatten().copied().collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let len = values.len();
    let q1 = values[len / 4];
    let q3 = values[(len * 3).div_ceil(4).min(len - 1)];
    let iqr = q3 - q1;

    Some(IqrBounds {
        q1,
        q3,
        lower: q1 - iqr * 1.5,
        upper: q3 + iqr * 1.5,
    })
}

/// Clips every value into the IQR bounds in place and returns the bounds used.
pub fn filter_iqr(spectra: &mut [Spectrum]) -> Option<IqrBounds> {
    let bounds = iqr_bounds(spectra)?;
    for value in spectra.iter_mut().flatten() {
        *value = value.clamp(bounds.lower, bounds.upper);
    }
    Some(bounds)
}
