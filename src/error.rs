//! Error types for spectro.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpectroError {
    // Configuration errors
    #[error("Bits per sample must be 8, 16 or 32, got {bits}")]
    InvalidBitDepth { bits: u32 },

    #[error("Only mono audio is supported, got {channels} channels")]
    UnsupportedChannels { channels: u16 },

    #[error("Window size must be a power of 2 between 128 and 4096, got {size}")]
    InvalidWindowSize { size: usize },

    #[error("Unknown window function: {name}")]
    UnknownWindowFunction { name: String },

    #[error("Invalid overlap {overlap}: {message}")]
    InvalidOverlap { overlap: f64, message: String },

    #[error("Worker count must be at least 1, got {workers}")]
    InvalidWorkerCount { workers: usize },

    #[error("Decibel floor must be a finite number, got {floor}")]
    InvalidDecibelFloor { floor: f64 },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Ingestion errors
    #[error("Unsupported chunk type: {kind}")]
    UnsupportedChunkType { kind: String },

    #[error("Chunk of {len} bytes is not a whole number of {width}-byte samples")]
    PartialSample { len: usize, width: usize },

    // Computation errors
    #[error("Transform failed: {message}")]
    Transform { message: String },

    #[error("Window {index} failed: {message}")]
    Worker { index: u64, message: String },

    // Lifecycle errors
    #[error("Spectrogram control thread is not running")]
    Disconnected,

    #[error("Timed out after {millis}ms waiting for the spectrogram to finish")]
    Timeout { millis: u128 },

    #[error("Run was cleared before it finished")]
    Cancelled,

    // Input glue
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpectroError>;

impl SpectroError {
    /// True for errors raised while validating a configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SpectroError::InvalidBitDepth { .. }
                | SpectroError::UnsupportedChannels { .. }
                | SpectroError::InvalidWindowSize { .. }
                | SpectroError::UnknownWindowFunction { .. }
                | SpectroError::InvalidOverlap { .. }
                | SpectroError::InvalidWorkerCount { .. }
                | SpectroError::InvalidDecibelFloor { .. }
                | SpectroError::ConfigParse { .. }
                | SpectroError::Config(_)
        )
    }
}
