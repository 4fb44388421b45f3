//! Ingestion chunks and their decoding into flat `f64` samples.

use crate::error::{Result, SpectroError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Width of one little-endian signed PCM sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::ThirtyTwo => 32,
        }
    }

    /// Bytes per sample.
    pub fn width(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = SpectroError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            32 => Ok(BitDepth::ThirtyTwo),
            _ => Err(SpectroError::InvalidBitDepth { bits }),
        }
    }
}

/// One unit of input handed to a spectrogram.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Little-endian signed PCM at the configured bit depth.
    Pcm(Vec<u8>),
    /// Already numeric samples, appended in order.
    Samples(Vec<f64>),
    /// Keyed samples, appended in key order.
    Keyed(BTreeMap<u64, f64>),
    /// Dynamically shaped input: an array or object of numbers.
    Json(Value),
}

impl Chunk {
    /// Decodes the whole chunk without touching any buffer.
    ///
    /// Either every sample decodes or an error is returned.
    pub fn decode(self, depth: BitDepth) -> Result<Vec<f64>> {
        match self {
            Chunk::Pcm(bytes) => decode_pcm(&bytes, depth),
            Chunk::Samples(samples) => Ok(samples),
            Chunk::Keyed(map) => Ok(map.into_values().collect()),
            Chunk::Json(value) => decode_json(value),
        }
    }
}

fn decode_pcm(bytes: &[u8], depth: BitDepth) -> Result<Vec<f64>> {
    let width = depth.width();
    if bytes.len() % width != 0 {
        return Err(SpectroError::PartialSample {
            len: bytes.len(),
            width,
        });
    }

    let samples = match depth {
        BitDepth::Eight => bytes.iter().map(|&b| b as i8 as f64).collect(),
        BitDepth::Sixteen => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f64)
            .collect(),
        BitDepth::ThirtyTwo => bytes
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect(),
    };
    Ok(samples)
}

fn decode_json(value: Value) -> Result<Vec<f64>> {
    match value {
        Value::Array(items) => items.iter().map(json_number).collect(),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| key_order(a, b));
            entries.into_iter().map(|(_, v)| json_number(v)).collect()
        }
        other => Err(unsupported(&other)),
    }
}

/// Integer-like keys first in numeric order, then the rest lexicographically.
fn key_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn json_number(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| unsupported(value))
}

fn unsupported(value: &Value) -> SpectroError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    SpectroError::UnsupportedChunkType {
        kind: kind.to_string(),
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Pcm(bytes)
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Chunk::Pcm(bytes.to_vec())
    }
}

impl From<Vec<f64>> for Chunk {
    fn from(samples: Vec<f64>) -> Self {
        Chunk::Samples(samples)
    }
}

impl From<&[f64]> for Chunk {
    fn from(samples: &[f64]) -> Self {
        Chunk::Samples(samples.to_vec())
    }
}

impl From<&[i16]> for Chunk {
    fn from(samples: &[i16]) -> Self {
        Chunk::Samples(samples.iter().map(|&s| s as f64).collect())
    }
}

impl From<BTreeMap<u64, f64>> for Chunk {
    fn from(map: BTreeMap<u64, f64>) -> Self {
        Chunk::Keyed(map)
    }
}

impl From<Value> for Chunk {
    fn from(value: Value) -> Self {
        Chunk::Json(value)
    }
}
