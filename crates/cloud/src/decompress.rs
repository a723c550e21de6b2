//! Tile decoding: decompression, predictor reversal and sample conversion.
//!
//! Supports DEFLATE (via `flate2`), LZW (via `weezl`), and uncompressed.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use s2cluster_core::RasterElement;

use crate::error::{CloudError, Result};
use crate::ifd::TiffByteOrder;

/// TIFF compression codes.
pub mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

/// TIFF sample format codes.
pub mod sample_format {
    pub const UNSIGNED_INT: u16 = 1;
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

/// TIFF predictor codes.
pub mod predictor {
    pub const NONE: u16 = 1;
    pub const HORIZONTAL: u16 = 2;
}

/// Decompress raw tile bytes according to the compression method.
pub fn decompress_tile(data: &[u8], compression_code: u16, expected_raw_size: usize) -> Result<Vec<u8>> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),

        #[cfg(feature = "deflate")]
        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            use std::io::Read;
            // zlib-wrapped in practice; some writers emit raw deflate
            let mut out = Vec::with_capacity(expected_raw_size);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
                return Ok(out);
            }
            out.clear();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| CloudError::Decompress(format!("DEFLATE: {e}")))?;
            Ok(out)
        }

        #[cfg(feature = "lzw")]
        compression::LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .decode(data)
            .map_err(|e| CloudError::Decompress(format!("LZW: {e}"))),

        _ => {
            let _ = expected_raw_size;
            Err(CloudError::UnsupportedCompression(compression_code))
        }
    }
}

/// Reverse horizontal differencing in place.
///
/// `row_samples` is the number of samples in one tile row
/// (`tile_width × samples_per_pixel`); `stride` is `samples_per_pixel`.
pub fn undo_predictor(
    data: &mut [u8],
    predictor_code: u16,
    bytes_per_sample: usize,
    row_samples: usize,
    stride: usize,
    byte_order: TiffByteOrder,
) -> Result<()> {
    match predictor_code {
        predictor::NONE => return Ok(()),
        predictor::HORIZONTAL => {}
        other => return Err(CloudError::UnsupportedPredictor(other)),
    }

    let row_bytes = row_samples * bytes_per_sample;
    if row_bytes == 0 {
        return Ok(());
    }

    for row in data.chunks_exact_mut(row_bytes) {
        match bytes_per_sample {
            1 => {
                for i in stride..row_samples {
                    row[i] = row[i].wrapping_add(row[i - stride]);
                }
            }
            2 => accumulate::<2>(row, row_samples, stride, byte_order),
            4 => accumulate::<4>(row, row_samples, stride, byte_order),
            8 => accumulate::<8>(row, row_samples, stride, byte_order),
            _ => return Err(CloudError::UnsupportedPredictor(predictor_code)),
        }
    }
    Ok(())
}

fn accumulate<const N: usize>(row: &mut [u8], row_samples: usize, stride: usize, order: TiffByteOrder) {
    let get = |row: &[u8], i: usize| -> u64 {
        let b = &row[i * N..(i + 1) * N];
        match order {
            TiffByteOrder::LittleEndian => LittleEndian::read_uint(b, N),
            TiffByteOrder::BigEndian => BigEndian::read_uint(b, N),
        }
    };
    let mask = if N == 8 { u64::MAX } else { (1u64 << (N * 8)) - 1 };

    for i in stride..row_samples {
        let sum = get(row, i).wrapping_add(get(row, i - stride)) & mask;
        let b = &mut row[i * N..(i + 1) * N];
        match order {
            TiffByteOrder::LittleEndian => LittleEndian::write_uint(b, sum, N),
            TiffByteOrder::BigEndian => BigEndian::write_uint(b, sum, N),
        }
    }
}

/// Decode the first sample of every pixel in `raw` into `T`.
///
/// `samples_per_pixel` is the interleave stride; values that do not fit in
/// `T` become `T`'s no-data value.
pub fn bytes_to_typed<T: RasterElement>(
    raw: &[u8],
    bits_per_sample: u16,
    sample_format: u16,
    samples_per_pixel: usize,
    byte_order: TiffByteOrder,
) -> Result<Vec<T>> {
    let bps = bits_per_sample;
    let sf = sample_format;
    let width = (bps as usize).div_ceil(8);
    if width == 0 || samples_per_pixel == 0 {
        return Err(CloudError::UnsupportedDataType { bps, sf });
    }

    macro_rules! decode {
        ($read:expr) => {{
            let le = byte_order == TiffByteOrder::LittleEndian;
            Ok(raw
                .chunks_exact(width * samples_per_pixel)
                .map(|px| {
                    let v = $read(le, &px[..width]);
                    num_traits::cast(v).unwrap_or_else(T::default_nodata)
                })
                .collect())
        }};
    }

    match (bps, sf) {
        (8, sample_format::UNSIGNED_INT) => decode!(|_, b: &[u8]| b[0]),
        (8, sample_format::SIGNED_INT) => decode!(|_, b: &[u8]| b[0] as i8),
        (16, sample_format::UNSIGNED_INT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_u16(b)
        } else {
            BigEndian::read_u16(b)
        }),
        (16, sample_format::SIGNED_INT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_i16(b)
        } else {
            BigEndian::read_i16(b)
        }),
        (32, sample_format::UNSIGNED_INT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_u32(b)
        } else {
            BigEndian::read_u32(b)
        }),
        (32, sample_format::SIGNED_INT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_i32(b)
        } else {
            BigEndian::read_i32(b)
        }),
        (32, sample_format::FLOAT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_f32(b)
        } else {
            BigEndian::read_f32(b)
        }),
        (64, sample_format::FLOAT) => decode!(|le, b: &[u8]| if le {
            LittleEndian::read_f64(b)
        } else {
            BigEndian::read_f64(b)
        }),
        _ => Err(CloudError::UnsupportedDataType { bps, sf }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompress_none() {
        let data = vec![1, 2, 3, 4];
        let out = decompress_tile(&data, compression::NONE, 4).unwrap();
        assert_eq!(out, data);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_decompress_zlib_and_raw_deflate() {
        use std::io::Write;
        let original: Vec<u8> = (0..512u32).map(|i| (i % 7) as u8).collect();

        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(&original).unwrap();
        let zlib = zlib.finish().unwrap();
        assert_eq!(decompress_tile(&zlib, compression::DEFLATE, 512).unwrap(), original);

        let mut raw = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        raw.write_all(&original).unwrap();
        let raw = raw.finish().unwrap();
        assert_eq!(decompress_tile(&raw, compression::ADOBE_DEFLATE, 512).unwrap(), original);
    }

    #[cfg(feature = "lzw")]
    #[test]
    fn test_decompress_lzw() {
        let original = b"sentinel sentinel sentinel sentinel".to_vec();
        let compressed = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(&original)
            .unwrap();
        assert_eq!(decompress_tile(&compressed, compression::LZW, original.len()).unwrap(), original);
    }

    #[test]
    fn test_unknown_compression() {
        assert!(matches!(
            decompress_tile(&[0], 7, 1),
            Err(CloudError::UnsupportedCompression(7))
        ));
    }

    #[test]
    fn test_undo_predictor_u16() {
        // Two rows of 3 samples: [100, 110, 90] and [5, 6, 7] differenced
        let diffs: [u16; 6] = [100, 10, 0u16.wrapping_sub(20), 5, 1, 1];
        let mut raw: Vec<u8> = diffs.iter().flat_map(|v| v.to_le_bytes()).collect();

        undo_predictor(&mut raw, predictor::HORIZONTAL, 2, 3, 1, TiffByteOrder::LittleEndian)
            .unwrap();

        let values: Vec<u16> =
            bytes_to_typed(&raw, 16, sample_format::UNSIGNED_INT, 1, TiffByteOrder::LittleEndian)
                .unwrap();
        assert_eq!(values, vec![100, 110, 90, 5, 6, 7]);
    }

    #[test]
    fn test_undo_predictor_u8_big_stride() {
        // 2 pixels x 2 samples
        let mut raw = vec![10u8, 20, 1, 2];
        undo_predictor(&mut raw, predictor::HORIZONTAL, 1, 4, 2, TiffByteOrder::BigEndian).unwrap();
        assert_eq!(raw, vec![10, 20, 11, 22]);

        assert!(undo_predictor(&mut raw, 3, 1, 4, 2, TiffByteOrder::BigEndian).is_err());
    }

    #[test]
    fn test_bytes_to_typed_big_endian() {
        let raw: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        let out: Vec<f64> =
            bytes_to_typed(&raw, 32, sample_format::FLOAT, 1, TiffByteOrder::BigEndian).unwrap();
        assert_eq!(out, vec![1.5, -2.0]);
    }

    #[test]
    fn test_bytes_to_typed_keeps_first_sample() {
        let raw: Vec<u8> = [7u16, 99, 8, 99].iter().flat_map(|v| v.to_le_bytes()).collect();
        let out: Vec<u16> =
            bytes_to_typed(&raw, 16, sample_format::UNSIGNED_INT, 2, TiffByteOrder::LittleEndian)
                .unwrap();
        assert_eq!(out, vec![7, 8]);
    }

    #[test]
    fn test_out_of_range_cast_becomes_nodata() {
        let raw: Vec<u8> = 300u16.to_le_bytes().to_vec();
        let out: Vec<u8> =
            bytes_to_typed(&raw, 16, sample_format::UNSIGNED_INT, 1, TiffByteOrder::LittleEndian)
                .unwrap();
        assert_eq!(out, vec![u8::default_nodata()]);
    }
}
