use crate::audio::chunk::BitDepth;
use crate::defaults;
use crate::dsp::window::WindowFunction;
use crate::error::{Result, SpectroError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub spectrogram: SpectrogramConfig,
    pub input: InputConfig,
}

/// Parameters of one spectrogram instance.
///
/// Immutable once a spectrogram is built from it; call [`validate`] (the
/// constructors do) before allocating anything.
///
/// [`validate`]: SpectrogramConfig::validate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Bits per sample of binary PCM chunks (8, 16 or 32).
    pub bits_per_sample: u32,
    /// Channel count; only mono is supported.
    pub channels: u16,
    /// Samples per window, a power of two in 128..=4096.
    pub window_size: usize,
    pub window_function: WindowFunction,
    /// Fraction of a window shared with the next one, in `[0, 1)`.
    pub overlap: f64,
    /// Number of parallel workers.
    pub workers: usize,
    /// Lowest dB value emitted for a coefficient.
    pub decibel_floor: f64,
}

/// Input streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Bytes handed to the engine per write.
    pub chunk_size: usize,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            bits_per_sample: defaults::BITS_PER_SAMPLE,
            channels: defaults::CHANNELS,
            window_size: defaults::WINDOW_SIZE,
            window_function: WindowFunction::default(),
            overlap: defaults::OVERLAP,
            workers: defaults::worker_count(),
            decibel_floor: defaults::DECIBEL_FLOOR,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE,
        }
    }
}

impl SpectrogramConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_window_function(mut self, window_function: WindowFunction) -> Self {
        self.window_function = window_function;
        self
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_bits_per_sample(mut self, bits: u32) -> Self {
        self.bits_per_sample = bits;
        self
    }

    pub fn with_decibel_floor(mut self, floor: f64) -> Self {
        self.decibel_floor = floor;
        self
    }

    /// Checks every field; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        self.bit_depth()?;

        if self.channels != 1 {
            return Err(SpectroError::UnsupportedChannels {
                channels: self.channels,
            });
        }

        if !self.window_size.is_power_of_two()
            || !(defaults::MIN_WINDOW_SIZE..=defaults::MAX_WINDOW_SIZE)
                .contains(&self.window_size)
        {
            return Err(SpectroError::InvalidWindowSize {
                size: self.window_size,
            });
        }

        if !(0.0..1.0).contains(&self.overlap) {
            return Err(SpectroError::InvalidOverlap {
                overlap: self.overlap,
                message: "overlap must be >= 0 and < 1".to_string(),
            });
        }

        if self.hop() == 0 {
            return Err(SpectroError::InvalidOverlap {
                overlap: self.overlap,
                message: format!(
                    "windows of {} samples would never advance",
                    self.window_size
                ),
            });
        }

        if self.workers < 1 {
            return Err(SpectroError::InvalidWorkerCount {
                workers: self.workers,
            });
        }

        if !self.decibel_floor.is_finite() {
            return Err(SpectroError::InvalidDecibelFloor {
                floor: self.decibel_floor,
            });
        }

        Ok(())
    }

    pub fn bit_depth(&self) -> Result<BitDepth> {
        BitDepth::try_from(self.bits_per_sample)
    }

    /// Samples shared between consecutive windows: `ceil(overlap * W)`.
    pub fn overlap_samples(&self) -> usize {
        (self.overlap * self.window_size as f64).ceil() as usize
    }

    /// Shift cursor advance per window: `W - ceil(overlap * W)`.
    pub fn hop(&self) -> usize {
        self.window_size.saturating_sub(self.overlap_samples())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The loaded spectrogram section is
    /// not validated here; that happens when a spectrogram is built.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(SpectroError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SPECTRO_WINDOW_SIZE → spectrogram.window_size
    /// - SPECTRO_WINDOW_FUNCTION → spectrogram.window_function
    /// - SPECTRO_OVERLAP → spectrogram.overlap
    /// - SPECTRO_WORKERS → spectrogram.workers
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(size) = env_value("SPECTRO_WINDOW_SIZE") {
            self.spectrogram.window_size = parse_env("SPECTRO_WINDOW_SIZE", &size)?;
        }

        if let Some(name) = env_value("SPECTRO_WINDOW_FUNCTION") {
            self.spectrogram.window_function = name.parse()?;
        }

        if let Some(overlap) = env_value("SPECTRO_OVERLAP") {
            self.spectrogram.overlap = parse_env("SPECTRO_OVERLAP", &overlap)?;
        }

        if let Some(workers) = env_value("SPECTRO_WORKERS") {
            self.spectrogram.workers = parse_env("SPECTRO_WORKERS", &workers)?;
        }

        Ok(self)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/spectro/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("spectro")
            .join("config.toml")
    }

    /// Serialize to a TOML document.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SpectroError::ConfigParse {
            message: e.to_string(),
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SpectroError::ConfigParse {
            message: format!("{key}={value} is not a valid value"),
        })
}
