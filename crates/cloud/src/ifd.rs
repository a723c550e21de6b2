//! TIFF IFD (Image File Directory) parsing over fetched byte ranges.
//!
//! Entries are parsed from raw bytes without `Read + Seek`; values that do
//! not fit in the 4-byte entry slot are fetched separately and attached to a
//! [`TagSet`] before the image structure is decoded.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{CloudError, Result};

/// Byte order of the TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffByteOrder {
    LittleEndian,
    BigEndian,
}

/// Well-known TIFF tag IDs.
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;

    /// Tags describing the pixel layout of one image.
    pub const STRUCTURE: &[u16] = &[
        IMAGE_WIDTH,
        IMAGE_LENGTH,
        BITS_PER_SAMPLE,
        COMPRESSION,
        STRIP_OFFSETS,
        SAMPLES_PER_PIXEL,
        ROWS_PER_STRIP,
        STRIP_BYTE_COUNTS,
        PLANAR_CONFIG,
        PREDICTOR,
        TILE_WIDTH,
        TILE_LENGTH,
        TILE_OFFSETS,
        TILE_BYTE_COUNTS,
        SAMPLE_FORMAT,
    ];

    /// Tags carrying georeferencing.
    pub const GEO: &[u16] = &[
        MODEL_PIXEL_SCALE,
        MODEL_TIEPOINT,
        MODEL_TRANSFORMATION,
        GEO_KEY_DIRECTORY,
        GDAL_NODATA,
    ];
}

/// Size in bytes of one value of a TIFF field type.
fn field_type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1), // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => Some(2),         // SHORT, SSHORT
        4 | 9 | 11 => Some(4),    // LONG, SLONG, FLOAT
        5 | 10 | 12 | 16 => Some(8), // RATIONAL, SRATIONAL, DOUBLE, LONG8
        _ => None,
    }
}

/// One 12-byte IFD entry.
#[derive(Debug, Clone)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    /// The 4-byte value slot, as stored in the file.
    pub slot: [u8; 4],
}

impl IfdEntry {
    /// Total size of the entry's value data.
    pub fn value_size(&self) -> u64 {
        field_type_size(self.field_type).unwrap_or(1) as u64 * self.count as u64
    }

    /// Whether the value fits in the entry slot.
    pub fn is_inline(&self) -> bool {
        self.value_size() <= 4
    }

    /// File offset of out-of-line value data.
    pub fn offset(&self, order: TiffByteOrder) -> u64 {
        read_u32(order, &self.slot) as u64
    }
}

/// Parsed TIFF header.
#[derive(Debug, Clone)]
pub struct TiffHeader {
    pub byte_order: TiffByteOrder,
    pub first_ifd_offset: u32,
}

/// A single parsed IFD with the offset to the next one.
#[derive(Debug, Clone)]
pub struct RawIfd {
    pub entries: Vec<IfdEntry>,
    pub next_ifd_offset: u32,
}

/// Parse the 8-byte TIFF header.
pub fn parse_header(data: &[u8]) -> Result<TiffHeader> {
    if data.len() < 8 {
        return Err(CloudError::InvalidTiff {
            reason: "header too short".into(),
        });
    }

    let byte_order = match &data[0..2] {
        b"II" => TiffByteOrder::LittleEndian,
        b"MM" => TiffByteOrder::BigEndian,
        _ => {
            return Err(CloudError::InvalidTiff {
                reason: "invalid byte order marker".into(),
            })
        }
    };

    match read_u16(byte_order, &data[2..4]) {
        42 => {}
        43 => {
            return Err(CloudError::InvalidTiff {
                reason: "BigTIFF is not supported".into(),
            })
        }
        magic => {
            return Err(CloudError::InvalidTiff {
                reason: format!("expected magic 42, got {magic}"),
            })
        }
    }

    Ok(TiffHeader {
        byte_order,
        first_ifd_offset: read_u32(byte_order, &data[4..8]),
    })
}

/// Number of bytes an IFD with `entry_count` entries occupies.
pub fn ifd_size(entry_count: usize) -> usize {
    2 + entry_count * 12 + 4
}

/// Parse one IFD. `data` must start at the IFD offset.
pub fn parse_ifd(byte_order: TiffByteOrder, data: &[u8]) -> Result<RawIfd> {
    if data.len() < 2 {
        return Err(CloudError::InvalidTiff {
            reason: "IFD too short".into(),
        });
    }

    let entry_count = read_u16(byte_order, &data[0..2]) as usize;
    let needed = ifd_size(entry_count);
    if data.len() < needed {
        return Err(CloudError::InvalidTiff {
            reason: format!("IFD needs {needed} bytes but only {} available", data.len()),
        });
    }

    let entries = data[2..2 + entry_count * 12]
        .chunks_exact(12)
        .map(|raw| IfdEntry {
            tag: read_u16(byte_order, &raw[0..2]),
            field_type: read_u16(byte_order, &raw[2..4]),
            count: read_u32(byte_order, &raw[4..8]),
            slot: [raw[8], raw[9], raw[10], raw[11]],
        })
        .collect();

    let next = needed - 4;
    Ok(RawIfd {
        entries,
        next_ifd_offset: read_u32(byte_order, &data[next..next + 4]),
    })
}

// ---------------------------------------------------------------------------
// Resolved tag values
// ---------------------------------------------------------------------------

/// The entries of one IFD plus the out-of-line value bytes fetched for them.
#[derive(Debug, Clone)]
pub struct TagSet {
    byte_order: TiffByteOrder,
    entries: Vec<IfdEntry>,
    external: HashMap<u16, Vec<u8>>,
}

impl TagSet {
    pub fn new(byte_order: TiffByteOrder, entries: Vec<IfdEntry>) -> Self {
        Self {
            byte_order,
            entries,
            external: HashMap::new(),
        }
    }

    /// Resolve every out-of-line value from a complete in-memory file.
    pub fn from_file_bytes(
        byte_order: TiffByteOrder,
        entries: Vec<IfdEntry>,
        file: &[u8],
    ) -> Result<Self> {
        let mut set = Self::new(byte_order, entries);
        let all: Vec<u16> = set.entries.iter().map(|e| e.tag).collect();
        for (tag, offset, len) in set.pending(&all) {
            let start = offset as usize;
            let end = start + len as usize;
            let bytes = file.get(start..end).ok_or_else(|| CloudError::InvalidTiff {
                reason: format!("tag {tag} value at {start}..{end} past end of file"),
            })?;
            set.attach(tag, bytes.to_vec());
        }
        Ok(set)
    }

    pub fn byte_order(&self) -> TiffByteOrder {
        self.byte_order
    }

    /// `(tag, offset, length)` of wanted out-of-line values not yet attached.
    pub fn pending(&self, wanted: &[u16]) -> Vec<(u16, u64, u64)> {
        self.entries
            .iter()
            .filter(|e| wanted.contains(&e.tag))
            .filter(|e| !e.is_inline() && !self.external.contains_key(&e.tag))
            .map(|e| (e.tag, e.offset(self.byte_order), e.value_size()))
            .collect()
    }

    /// Attach fetched value bytes for a tag.
    pub fn attach(&mut self, tag: u16, bytes: Vec<u8>) {
        self.external.insert(tag, bytes);
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    fn value(&self, tag: u16) -> Option<(&IfdEntry, &[u8])> {
        let entry = self.entries.iter().find(|e| e.tag == tag)?;
        let bytes = if entry.is_inline() {
            &entry.slot[..]
        } else {
            self.external.get(&tag)?.as_slice()
        };
        Some((entry, bytes))
    }

    /// Integer values of a tag (BYTE, SHORT, LONG, LONG8).
    pub fn u64s(&self, tag: u16) -> Option<Vec<u64>> {
        let (entry, bytes) = self.value(tag)?;
        let order = self.byte_order;
        let width = field_type_size(entry.field_type)?;
        let values = bytes
            .chunks_exact(width)
            .take(entry.count as usize)
            .map(|b| match entry.field_type {
                1 | 7 => Some(b[0] as u64),
                3 => Some(read_u16(order, b) as u64),
                4 => Some(read_u32(order, b) as u64),
                16 => Some(read_u64(order, b)),
                _ => None,
            })
            .collect::<Option<Vec<u64>>>()?;
        Some(values)
    }

    /// First integer value of a tag.
    pub fn u64(&self, tag: u16) -> Option<u64> {
        self.u64s(tag)?.first().copied()
    }

    /// First value of a tag narrowed to `u16`.
    pub fn u16(&self, tag: u16) -> Option<u16> {
        self.u64(tag).and_then(|v| u16::try_from(v).ok())
    }

    /// Floating point values of a tag (FLOAT or DOUBLE).
    pub fn f64s(&self, tag: u16) -> Option<Vec<f64>> {
        let (entry, bytes) = self.value(tag)?;
        let order = self.byte_order;
        let values: Vec<f64> = match entry.field_type {
            11 => bytes
                .chunks_exact(4)
                .map(|b| read_f32(order, b) as f64)
                .collect(),
            12 => bytes.chunks_exact(8).map(|b| read_f64(order, b)).collect(),
            _ => return None,
        };
        (!values.is_empty()).then_some(values)
    }

    /// NUL-terminated ASCII value of a tag.
    pub fn ascii(&self, tag: u16) -> Option<String> {
        let (entry, bytes) = self.value(tag)?;
        let bytes = &bytes[..(entry.count as usize).min(bytes.len())];
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Image structure
// ---------------------------------------------------------------------------

/// Pixel layout of one image, decoded from its structure tags.
///
/// Stripped images are described as tiles spanning the full width so one
/// code path reads both layouts.
#[derive(Debug, Clone)]
pub struct IfdInfo {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_offsets: Vec<u64>,
    pub tile_byte_counts: Vec<u64>,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub compression: u16,
    pub samples_per_pixel: u16,
    pub planar_config: u16,
    pub predictor: u16,
    pub byte_order: TiffByteOrder,
}

impl IfdInfo {
    pub fn from_tags(set: &TagSet) -> Result<Self> {
        let missing = |what: &str| CloudError::InvalidTiff {
            reason: format!("missing {what}"),
        };

        let width = set.u64(tags::IMAGE_WIDTH).ok_or_else(|| missing("ImageWidth"))? as u32;
        let height = set.u64(tags::IMAGE_LENGTH).ok_or_else(|| missing("ImageLength"))? as u32;

        let (tile_width, tile_height, tile_offsets, tile_byte_counts) =
            if set.contains(tags::TILE_WIDTH) {
                (
                    set.u64(tags::TILE_WIDTH).ok_or_else(|| missing("TileWidth"))? as u32,
                    set.u64(tags::TILE_LENGTH).ok_or_else(|| missing("TileLength"))? as u32,
                    set.u64s(tags::TILE_OFFSETS).ok_or_else(|| missing("TileOffsets"))?,
                    set
                        .u64s(tags::TILE_BYTE_COUNTS)
                        .ok_or_else(|| missing("TileByteCounts"))?,
                )
            } else {
                let rows_per_strip = set
                    .u64(tags::ROWS_PER_STRIP)
                    .map(|r| r.min(height as u64) as u32)
                    .unwrap_or(height);
                (
                    width,
                    rows_per_strip,
                    set.u64s(tags::STRIP_OFFSETS).ok_or_else(|| missing("StripOffsets"))?,
                    set
                        .u64s(tags::STRIP_BYTE_COUNTS)
                        .ok_or_else(|| missing("StripByteCounts"))?,
                )
            };

        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(CloudError::InvalidTiff {
                reason: format!("degenerate layout {width}x{height}, block {tile_width}x{tile_height}"),
            });
        }

        let info = Self {
            width,
            height,
            tile_width,
            tile_height,
            tile_offsets,
            tile_byte_counts,
            bits_per_sample: set.u16(tags::BITS_PER_SAMPLE).unwrap_or(1),
            sample_format: set.u16(tags::SAMPLE_FORMAT).unwrap_or(1),
            compression: set.u16(tags::COMPRESSION).unwrap_or(1),
            samples_per_pixel: set.u16(tags::SAMPLES_PER_PIXEL).unwrap_or(1),
            planar_config: set.u16(tags::PLANAR_CONFIG).unwrap_or(1),
            predictor: set.u16(tags::PREDICTOR).unwrap_or(1),
            byte_order: set.byte_order(),
        };

        let expected = info.tiles_across() * info.tiles_down();
        if info.tile_offsets.len() < expected || info.tile_byte_counts.len() < expected {
            return Err(CloudError::InvalidTiff {
                reason: format!(
                    "{} offsets / {} byte counts for {expected} blocks",
                    info.tile_offsets.len(),
                    info.tile_byte_counts.len()
                ),
            });
        }

        Ok(info)
    }

    pub fn tiles_across(&self) -> usize {
        (self.width as usize).div_ceil(self.tile_width as usize)
    }

    pub fn tiles_down(&self) -> usize {
        (self.height as usize).div_ceil(self.tile_height as usize)
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Decompressed size of one full tile.
    pub fn tile_raw_size(&self) -> usize {
        self.tile_width as usize
            * self.tile_height as usize
            * self.samples_per_pixel as usize
            * self.bytes_per_sample()
    }
}

// ---- Byte order helpers ----

pub(crate) fn read_u16(order: TiffByteOrder, data: &[u8]) -> u16 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u16(data),
        TiffByteOrder::BigEndian => BigEndian::read_u16(data),
    }
}

pub(crate) fn read_u32(order: TiffByteOrder, data: &[u8]) -> u32 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u32(data),
        TiffByteOrder::BigEndian => BigEndian::read_u32(data),
    }
}

fn read_u64(order: TiffByteOrder, data: &[u8]) -> u64 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u64(data),
        TiffByteOrder::BigEndian => BigEndian::read_u64(data),
    }
}

fn read_f32(order: TiffByteOrder, data: &[u8]) -> f32 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_f32(data),
        TiffByteOrder::BigEndian => BigEndian::read_f32(data),
    }
}

fn read_f64(order: TiffByteOrder, data: &[u8]) -> f64 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_f64(data),
        TiffByteOrder::BigEndian => BigEndian::read_f64(data),
    }
}
