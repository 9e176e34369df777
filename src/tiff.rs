//! Minimal TIFF codec for shaped, multi-dimensional fixtures.
//!
//! Only the subset the fixture pipeline produces is supported: classic
//! little-endian TIFF, uncompressed single-strip pages, one sample per pixel.
//! An N-dimensional series is stored as `prod(shape[..n-2])` pages of
//! `shape[n-2] x shape[n-1]` pixels, and the first page of every series carries
//! an ImageDescription JSON (`{"shape": [...], "axes": "..."}`) so the reader
//! can regroup pages into series.
mod read;
mod write;

pub use read::read_tiff;
pub use write::write_tiff;

use crate::dtype::Dtype;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub(crate) const TAG_NEW_SUBFILE_TYPE: u16 = 254;
pub(crate) const TAG_IMAGE_WIDTH: u16 = 256;
pub(crate) const TAG_IMAGE_LENGTH: u16 = 257;
pub(crate) const TAG_BITS_PER_SAMPLE: u16 = 258;
pub(crate) const TAG_COMPRESSION: u16 = 259;
pub(crate) const TAG_PHOTOMETRIC: u16 = 262;
pub(crate) const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub(crate) const TAG_STRIP_OFFSETS: u16 = 273;
pub(crate) const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub(crate) const TAG_ROWS_PER_STRIP: u16 = 278;
pub(crate) const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub(crate) const TAG_PLANAR_CONFIG: u16 = 284;
pub(crate) const TAG_SAMPLE_FORMAT: u16 = 339;

pub(crate) const TYPE_ASCII: u16 = 2;
pub(crate) const TYPE_SHORT: u16 = 3;
pub(crate) const TYPE_LONG: u16 = 4;

pub(crate) const COMPRESSION_NONE: u32 = 1;
pub(crate) const PHOTOMETRIC_MIN_IS_BLACK: u32 = 1;

/// Shape metadata stored in the first page of each series.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ShapedDescription {
    pub shape: Vec<usize>,
    pub axes: String,
}

/// One image series: axis-tagged, C-ordered, little-endian sample bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSeries {
    pub axes: String,
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub data: Vec<u8>,
}

impl ImageSeries {
    pub fn new(axes: &str, shape: Vec<usize>, dtype: Dtype, data: Vec<u8>) -> Result<Self> {
        let series = Self {
            axes: axes.to_string(),
            shape,
            dtype,
            data,
        };
        series.check()?;
        Ok(series)
    }

    /// Verify that axes, shape and payload length agree.
    pub fn check(&self) -> Result<()> {
        if self.shape.len() < 2 {
            return Err(anyhow!(
                "series needs at least two dimensions, got shape {:?}",
                self.shape
            ));
        }
        if self.axes.chars().count() != self.shape.len() {
            return Err(anyhow!(
                "axes {:?} do not match shape {:?}",
                self.axes,
                self.shape
            ));
        }
        if self.shape.contains(&0) {
            return Err(anyhow!("series shape {:?} has an empty dimension", self.shape));
        }
        let expected = self.element_count() * self.dtype.byte_width();
        if self.data.len() != expected {
            return Err(anyhow!(
                "series payload is {} bytes, expected {expected} for {} {:?}",
                self.data.len(),
                self.dtype,
                self.shape
            ));
        }
        Ok(())
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub(crate) fn page_height(&self) -> usize {
        self.shape[self.shape.len() - 2]
    }

    pub(crate) fn page_width(&self) -> usize {
        self.shape[self.shape.len() - 1]
    }

    pub(crate) fn description(&self) -> ShapedDescription {
        ShapedDescription {
            shape: self.shape.clone(),
            axes: self.axes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::read::decode_tiff;
    use super::write::TiffWriter;
    use super::*;

    fn ramp(axes: &str, shape: Vec<usize>, dtype: Dtype) -> ImageSeries {
        let count: usize = shape.iter().product();
        let values: Vec<f64> = (0..count).map(|i| i as f64 / count as f64).collect();
        ImageSeries::new(axes, shape, dtype, dtype.encode(&values)).expect("valid series")
    }

    #[test]
    fn series_rejects_mismatched_payload() {
        let err = ImageSeries::new("YX", vec![2, 3], Dtype::Uint16, vec![0; 6]).unwrap_err();
        assert!(err.to_string().contains("expected 12"));
    }

    #[test]
    fn series_rejects_axes_shape_mismatch() {
        assert!(ImageSeries::new("YXZ", vec![2, 3], Dtype::Uint8, vec![0; 6]).is_err());
        assert!(ImageSeries::new("Y", vec![6], Dtype::Uint8, vec![0; 6]).is_err());
    }

    #[test]
    fn series_round_trip_through_bytes() {
        let series = ramp("ZYX", vec![3, 4, 5], Dtype::Float32);
        let mut writer = TiffWriter::new();
        writer.write_series(&series).expect("write series");
        let decoded = decode_tiff(&writer.into_bytes()).expect("decode");
        assert_eq!(decoded, vec![series]);
    }

    #[test]
    fn concatenated_series_keep_their_own_axes() {
        let first = ramp("YX", vec![10, 11], Dtype::Uint8);
        let second = ramp("YXZ", vec![10, 11, 12], Dtype::Float32);
        let third = ramp("SQXY", vec![5, 1, 11, 10], Dtype::Float16);
        let mut writer = TiffWriter::new();
        for series in [&first, &second, &third] {
            writer.write_series(series).expect("write series");
        }
        let decoded = decode_tiff(&writer.into_bytes()).expect("decode");
        let axes: Vec<&str> = decoded.iter().map(|s| s.axes.as_str()).collect();
        assert_eq!(axes, ["YX", "YXZ", "SQXY"]);
        assert_eq!(decoded[1].shape, vec![10, 11, 12]);
        assert_eq!(decoded[2].dtype, Dtype::Float16);
        assert_eq!(decoded[2], third);
    }

    #[test]
    fn reader_rejects_big_endian_files() {
        let err = decode_tiff(b"MM\0*\0\0\0\x08").unwrap_err();
        assert!(err.to_string().contains("little-endian"));
    }

    #[test]
    fn reader_rejects_truncated_files() {
        let series = ramp("YX", vec![4, 4], Dtype::Uint8);
        let mut writer = TiffWriter::new();
        writer.write_series(&series).expect("write series");
        let bytes = writer.into_bytes();
        assert!(decode_tiff(&bytes[..bytes.len() - 20]).is_err());
    }
}
