//! spectro - parallel PCM-to-spectrogram engine
//!
//! Streams mono PCM into a sample buffer, cuts it into overlapping windows
//! and computes one dB spectrum per window on a pool of worker threads.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dsp;
pub mod error;
pub mod pipeline;

// Ingestion
pub use audio::{BitDepth, Chunk};

// Spectrogram
pub use pipeline::orchestrator::Spectrogram;
pub use pipeline::types::{EngineStatus, FinishedSpectrogram, SpectrogramEvent, Spectrum};

// Transform boundary
pub use dsp::{Dct2, SpectralTransform, WindowFunction};

// Error handling
pub use error::{Result, SpectroError};

// Config
pub use config::{Config, SpectrogramConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
