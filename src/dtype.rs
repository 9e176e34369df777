//! Numeric encodings for fixture pixel data.
//!
//! Every encoding is derived from the same continuous `f64` field so that the
//! encodings of one configuration stay comparable.
use half::f16;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TIFF `SampleFormat` values used by the codec.
pub const SAMPLE_FORMAT_UINT: u16 = 1;
pub const SAMPLE_FORMAT_FLOAT: u16 = 3;

/// Pixel encodings written by the fixture generator.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    Float16,
    Float32,
    Uint8,
    Uint16,
}

impl Dtype {
    /// Full sweep, in generation order.
    pub const ALL: [Dtype; 4] = [Dtype::Float16, Dtype::Float32, Dtype::Uint8, Dtype::Uint16];

    /// Return the stable name used in fixture file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Float16 => "float16",
            Dtype::Float32 => "float32",
            Dtype::Uint8 => "uint8",
            Dtype::Uint16 => "uint16",
        }
    }

    pub fn byte_width(&self) -> usize {
        match self {
            Dtype::Uint8 => 1,
            Dtype::Float16 | Dtype::Uint16 => 2,
            Dtype::Float32 => 4,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        (self.byte_width() * 8) as u16
    }

    pub fn sample_format(&self) -> u16 {
        match self {
            Dtype::Float16 | Dtype::Float32 => SAMPLE_FORMAT_FLOAT,
            Dtype::Uint8 | Dtype::Uint16 => SAMPLE_FORMAT_UINT,
        }
    }

    /// Map TIFF sample tags back to an encoding.
    pub fn from_tiff(bits_per_sample: u16, sample_format: u16) -> Option<Dtype> {
        match (bits_per_sample, sample_format) {
            (8, SAMPLE_FORMAT_UINT) => Some(Dtype::Uint8),
            (16, SAMPLE_FORMAT_UINT) => Some(Dtype::Uint16),
            (16, SAMPLE_FORMAT_FLOAT) => Some(Dtype::Float16),
            (32, SAMPLE_FORMAT_FLOAT) => Some(Dtype::Float32),
            _ => None,
        }
    }

    /// Encode a continuous field as little-endian samples.
    ///
    /// Integer encodings scale by the type maximum and round half to even
    /// before the (saturating) cast.
    pub fn encode<'a, I>(&self, values: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let values = values.into_iter();
        let mut out = Vec::with_capacity(values.size_hint().0 * self.byte_width());
        for &value in values {
            match self {
                Dtype::Float16 => out.extend_from_slice(&f16::from_f64(value).to_le_bytes()),
                Dtype::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
                Dtype::Uint8 => {
                    let scaled = (value * f64::from(u8::MAX)).round_ties_even();
                    out.push(scaled as u8);
                }
                Dtype::Uint16 => {
                    let scaled = (value * f64::from(u16::MAX)).round_ties_even();
                    out.extend_from_slice(&(scaled as u16).to_le_bytes());
                }
            }
        }
        out
    }

    /// Decode little-endian samples back to `f64`.
    #[cfg(test)]
    pub fn decode(&self, bytes: &[u8]) -> Vec<f64> {
        match self {
            Dtype::Uint8 => bytes.iter().map(|&b| f64::from(b)).collect(),
            Dtype::Uint16 => bytes
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            Dtype::Float16 => bytes
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f64())
                .collect(),
            Dtype::Float32 => bytes
                .chunks_exact(4)
                .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
