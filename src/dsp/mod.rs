//! Signal processing building blocks used by the workers and by callers of a
//! finished spectrogram.

pub mod aggregate;
pub mod transform;
pub mod window;

pub use aggregate::{IqrBounds, filter_iqr, iqr_bounds, max_amplitude, min_amplitude};
pub use transform::{Dct2, SpectralTransform, bin_frequency, to_decibels};
pub use window::WindowFunction;
