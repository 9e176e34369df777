use super::{
    ImageSeries, COMPRESSION_NONE, PHOTOMETRIC_MIN_IS_BLACK, TAG_BITS_PER_SAMPLE,
    TAG_COMPRESSION, TAG_IMAGE_DESCRIPTION, TAG_IMAGE_LENGTH, TAG_IMAGE_WIDTH,
    TAG_NEW_SUBFILE_TYPE, TAG_PHOTOMETRIC, TAG_PLANAR_CONFIG, TAG_ROWS_PER_STRIP,
    TAG_SAMPLES_PER_PIXEL, TAG_SAMPLE_FORMAT, TAG_STRIP_BYTE_COUNTS, TAG_STRIP_OFFSETS,
    TYPE_ASCII, TYPE_LONG, TYPE_SHORT,
};
use crate::util::publish_bytes;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Write every series into one TIFF file at `path`.
pub fn write_tiff(path: &Path, series: &[ImageSeries]) -> Result<()> {
    let mut writer = TiffWriter::new();
    for item in series {
        writer
            .write_series(item)
            .with_context(|| format!("encode {}", path.display()))?;
    }
    publish_bytes(path, &writer.into_bytes())
}

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    value: u32,
}

impl IfdEntry {
    fn short(tag: u16, value: u16) -> Self {
        Self {
            tag,
            kind: TYPE_SHORT,
            count: 1,
            value: u32::from(value),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            kind: TYPE_LONG,
            count: 1,
            value,
        }
    }
}

/// In-memory TIFF builder; pages are appended in order and chained as they go.
pub struct TiffWriter {
    buf: Vec<u8>,
    next_ifd_slot: usize,
}

impl Default for TiffWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(b"II");
        buf.extend_from_slice(&42u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        Self {
            buf,
            next_ifd_slot: 4,
        }
    }

    /// Append one series as a run of pages.
    pub fn write_series(&mut self, series: &ImageSeries) -> Result<()> {
        series.check()?;
        let description = serde_json::to_string(&series.description())
            .context("serialize series description")?;
        let page_bytes = series.page_height() * series.page_width() * series.dtype.byte_width();
        for (index, page) in series.data.chunks_exact(page_bytes).enumerate() {
            let description = (index == 0).then_some(description.as_str());
            self.write_page(series, page, description)?;
        }
        Ok(())
    }

    fn write_page(
        &mut self,
        series: &ImageSeries,
        data: &[u8],
        description: Option<&str>,
    ) -> Result<()> {
        let description_ref = match description {
            Some(text) => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                let offset = self.append_aligned(&bytes)?;
                Some((offset, bytes.len()))
            }
            None => None,
        };
        let data_offset = self.append_aligned(data)?;

        let width = to_u32(series.page_width(), "page width")?;
        let height = to_u32(series.page_height(), "page height")?;
        let mut entries = vec![
            IfdEntry::long(TAG_NEW_SUBFILE_TYPE, 0),
            IfdEntry::long(TAG_IMAGE_WIDTH, width),
            IfdEntry::long(TAG_IMAGE_LENGTH, height),
            IfdEntry::short(TAG_BITS_PER_SAMPLE, series.dtype.bits_per_sample()),
            IfdEntry::short(TAG_COMPRESSION, COMPRESSION_NONE as u16),
            IfdEntry::short(TAG_PHOTOMETRIC, PHOTOMETRIC_MIN_IS_BLACK as u16),
        ];
        if let Some((offset, len)) = description_ref {
            entries.push(IfdEntry {
                tag: TAG_IMAGE_DESCRIPTION,
                kind: TYPE_ASCII,
                count: to_u32(len, "description length")?,
                value: offset,
            });
        }
        entries.extend([
            IfdEntry::long(TAG_STRIP_OFFSETS, data_offset),
            IfdEntry::short(TAG_SAMPLES_PER_PIXEL, 1),
            IfdEntry::long(TAG_ROWS_PER_STRIP, height),
            IfdEntry::long(TAG_STRIP_BYTE_COUNTS, to_u32(data.len(), "strip size")?),
            IfdEntry::short(TAG_PLANAR_CONFIG, 1),
            IfdEntry::short(TAG_SAMPLE_FORMAT, series.dtype.sample_format()),
        ]);

        self.align();
        let ifd_offset = to_u32(self.buf.len(), "IFD offset")?;
        self.patch_u32(self.next_ifd_slot, ifd_offset);

        self.buf
            .extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in &entries {
            self.buf.extend_from_slice(&entry.tag.to_le_bytes());
            self.buf.extend_from_slice(&entry.kind.to_le_bytes());
            self.buf.extend_from_slice(&entry.count.to_le_bytes());
            // SHORT values are left-justified in the 4-byte value field.
            self.buf.extend_from_slice(&entry.value.to_le_bytes());
        }
        self.next_ifd_slot = self.buf.len();
        self.buf.extend_from_slice(&0u32.to_le_bytes());
        Ok(())
    }

    fn align(&mut self) {
        if self.buf.len() % 2 == 1 {
            self.buf.push(0);
        }
    }

    fn append_aligned(&mut self, bytes: &[u8]) -> Result<u32> {
        self.align();
        let offset = to_u32(self.buf.len(), "data offset")?;
        self.buf.extend_from_slice(bytes);
        Ok(offset)
    }

    fn patch_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn to_u32(value: usize, label: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{label} {value} exceeds classic TIFF limits"))
}
