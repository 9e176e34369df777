use super::{
    ImageSeries, ShapedDescription, COMPRESSION_NONE, TAG_BITS_PER_SAMPLE, TAG_COMPRESSION,
    TAG_IMAGE_DESCRIPTION, TAG_IMAGE_LENGTH, TAG_IMAGE_WIDTH, TAG_SAMPLES_PER_PIXEL,
    TAG_SAMPLE_FORMAT, TAG_STRIP_BYTE_COUNTS, TAG_STRIP_OFFSETS, TYPE_ASCII, TYPE_LONG,
    TYPE_SHORT,
};
use crate::dtype::{Dtype, SAMPLE_FORMAT_UINT};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Read every series stored in a TIFF file.
pub fn read_tiff(path: &Path) -> Result<Vec<ImageSeries>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    decode_tiff(&bytes).with_context(|| format!("decode {}", path.display()))
}

/// Decode TIFF bytes into series, regrouping pages by their shaped descriptions.
pub fn decode_tiff(bytes: &[u8]) -> Result<Vec<ImageSeries>> {
    let reader = ByteReader { bytes };
    if bytes.get(..2) != Some(b"II".as_slice()) {
        return Err(anyhow!("only little-endian TIFF is supported"));
    }
    if reader.u16_at(2)? != 42 {
        return Err(anyhow!("not a classic TIFF file"));
    }

    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = reader.u32_at(4)? as usize;
    while offset != 0 {
        if !seen.insert(offset) {
            return Err(anyhow!("IFD chain loops back to offset {offset}"));
        }
        let (page, next) = read_page(&reader, offset)
            .with_context(|| format!("page {} at offset {offset}", pages.len()))?;
        pages.push(page);
        offset = next;
    }
    group_series(pages)
}

struct Page {
    width: usize,
    height: usize,
    dtype: Dtype,
    description: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone, Copy)]
struct RawEntry {
    kind: u16,
    count: usize,
    value_offset: usize,
}

struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl ByteReader<'_> {
    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| anyhow!("read of {len} bytes at offset {offset} is out of bounds"))
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read the integer values of a SHORT or LONG entry.
    fn values(&self, entry: RawEntry) -> Result<Vec<usize>> {
        let width = match entry.kind {
            TYPE_SHORT => 2,
            TYPE_LONG => 4,
            other => return Err(anyhow!("unsupported integer field type {other}")),
        };
        let start = if entry.count * width <= 4 {
            entry.value_offset
        } else {
            self.u32_at(entry.value_offset)? as usize
        };
        (0..entry.count)
            .map(|i| {
                let at = start + i * width;
                if width == 2 {
                    self.u16_at(at).map(usize::from)
                } else {
                    self.u32_at(at).map(|v| v as usize)
                }
            })
            .collect()
    }

    fn ascii(&self, entry: RawEntry) -> Result<String> {
        if entry.kind != TYPE_ASCII {
            return Err(anyhow!("expected ASCII field, got type {}", entry.kind));
        }
        let start = if entry.count <= 4 {
            entry.value_offset
        } else {
            self.u32_at(entry.value_offset)? as usize
        };
        let raw = self.slice(start, entry.count)?;
        let trimmed = raw.split(|&b| b == 0).next().unwrap_or_default();
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }
}

fn read_page(reader: &ByteReader<'_>, offset: usize) -> Result<(Page, usize)> {
    let count = reader.u16_at(offset)? as usize;
    let mut entries = BTreeMap::new();
    for index in 0..count {
        let at = offset + 2 + index * 12;
        let tag = reader.u16_at(at)?;
        let entry = RawEntry {
            kind: reader.u16_at(at + 2)?,
            count: reader.u32_at(at + 4)? as usize,
            value_offset: at + 8,
        };
        entries.insert(tag, entry);
    }
    let next = reader.u32_at(offset + 2 + count * 12)? as usize;

    let single = |tag: u16, default: Option<usize>| -> Result<usize> {
        match entries.get(&tag) {
            Some(entry) => reader
                .values(*entry)?
                .first()
                .copied()
                .ok_or_else(|| anyhow!("tag {tag} has no value")),
            None => default.ok_or_else(|| anyhow!("missing required tag {tag}")),
        }
    };

    let width = single(TAG_IMAGE_WIDTH, None)?;
    let height = single(TAG_IMAGE_LENGTH, None)?;
    let bits = single(TAG_BITS_PER_SAMPLE, Some(1))?;
    let compression = single(TAG_COMPRESSION, Some(COMPRESSION_NONE as usize))?;
    let samples = single(TAG_SAMPLES_PER_PIXEL, Some(1))?;
    let sample_format = single(TAG_SAMPLE_FORMAT, Some(usize::from(SAMPLE_FORMAT_UINT)))?;
    if compression != COMPRESSION_NONE as usize {
        return Err(anyhow!("unsupported compression {compression}"));
    }
    if samples != 1 {
        return Err(anyhow!("unsupported samples per pixel {samples}"));
    }
    let dtype = Dtype::from_tiff(bits as u16, sample_format as u16).ok_or_else(|| {
        anyhow!("unsupported sample encoding: {bits} bits, format {sample_format}")
    })?;

    let strip_offsets = entries
        .get(&TAG_STRIP_OFFSETS)
        .ok_or_else(|| anyhow!("missing strip offsets"))
        .and_then(|entry| reader.values(*entry))?;
    let strip_counts = entries
        .get(&TAG_STRIP_BYTE_COUNTS)
        .ok_or_else(|| anyhow!("missing strip byte counts"))
        .and_then(|entry| reader.values(*entry))?;
    if strip_offsets.len() != strip_counts.len() {
        return Err(anyhow!("strip offset and byte count tables differ in length"));
    }
    let mut data = Vec::new();
    for (start, len) in strip_offsets.iter().zip(&strip_counts) {
        data.extend_from_slice(reader.slice(*start, *len)?);
    }
    let expected = width * height * dtype.byte_width();
    if data.len() != expected {
        return Err(anyhow!(
            "page holds {} bytes, expected {expected}",
            data.len()
        ));
    }

    let description = entries
        .get(&TAG_IMAGE_DESCRIPTION)
        .map(|entry| reader.ascii(*entry))
        .transpose()?;

    Ok((
        Page {
            width,
            height,
            dtype,
            description,
            data,
        },
        next,
    ))
}

fn shaped_description(page: &Page) -> Option<ShapedDescription> {
    let text = page.description.as_deref()?;
    let parsed: ShapedDescription = serde_json::from_str(text).ok()?;
    let n = parsed.shape.len();
    if n < 2 || parsed.axes.chars().count() != n {
        return None;
    }
    if parsed.shape[n - 2] != page.height || parsed.shape[n - 1] != page.width {
        return None;
    }
    Some(parsed)
}

fn group_series(pages: Vec<Page>) -> Result<Vec<ImageSeries>> {
    let mut series = Vec::new();
    let mut pages = pages.into_iter();
    while let Some(first) = pages.next() {
        let Some(description) = shaped_description(&first) else {
            series.push(ImageSeries::new(
                "YX",
                vec![first.height, first.width],
                first.dtype,
                first.data,
            )?);
            continue;
        };
        let n = description.shape.len();
        let page_count: usize = description.shape[..n - 2].iter().product();
        let mut data = first.data;
        for index in 1..page_count {
            let page = pages.next().ok_or_else(|| {
                anyhow!(
                    "series {:?} expects {page_count} pages, found {index}",
                    description.axes
                )
            })?;
            if page.width != first.width || page.height != first.height || page.dtype != first.dtype
            {
                return Err(anyhow!(
                    "page {index} of series {:?} differs in size or encoding",
                    description.axes
                ));
            }
            data.extend_from_slice(&page.data);
        }
        series.push(ImageSeries::new(
            &description.axes,
            description.shape,
            first.dtype,
            data,
        )?);
    }
    Ok(series)
}
