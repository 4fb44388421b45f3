//! WAV file input for the command-line front end.

use crate::error::{Result, SpectroError};
use std::io::Read;

/// Mono integer PCM read from a WAV container.
#[derive(Debug, Clone)]
pub struct WavInput {
    samples: Vec<f64>,
    sample_rate: u32,
    bits_per_sample: u16,
}

impl WavInput {
    /// Create from any reader (for testing/flexibility).
    ///
    /// Only mono integer PCM is accepted; the samples keep their integer
    /// scale, exactly as binary PCM chunks decode.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| SpectroError::AudioDecode {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.channels != 1 {
            return Err(SpectroError::UnsupportedChannels {
                channels: spec.channels,
            });
        }
        if spec.sample_format != hound::SampleFormat::Int {
            return Err(SpectroError::AudioDecode {
                message: "only integer PCM WAV files are supported".to_string(),
            });
        }

        let samples = wav_reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SpectroError::AudioDecode {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        })
    }

    /// Read a whole WAV document from stdin.
    pub fn from_stdin() -> Result<Self> {
        let mut buffer = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buffer)?;
        Self::from_reader(std::io::Cursor::new(buffer))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}
