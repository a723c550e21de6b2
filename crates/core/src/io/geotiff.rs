//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for the container and writes the handful of
//! GeoTIFF tags needed to georeference a single-band grid:
//! ModelPixelScale + ModelTiepoint (or ModelTransformation for rotated
//! grids), a GeoKeyDirectory carrying the EPSG code, and GDAL_NODATA.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray16, Gray32Float, Gray8};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Cell types that can be written as a single-band GeoTIFF
pub trait GeoTiffSample: RasterElement {
    /// Matching `tiff` color type
    type Color: ColorType<Inner = Self>;
}

impl GeoTiffSample for u8 {
    type Color = Gray8;
}

impl GeoTiffSample for u16 {
    type Color = Gray16;
}

impl GeoTiffSample for f32 {
    type Color = Gray32Float;
}

/// Read the first band of a GeoTIFF file into a Raster.
///
/// Samples are cast into `T`; values that do not fit become `T`'s no-data
/// value. The transform, EPSG code and GDAL no-data value are recovered
/// when the corresponding tags are present.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Write a Raster to a single-band GeoTIFF file, replacing any existing file.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: GeoTiffSample,
    [T]: TiffValue,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn cast_samples<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::U8(buf) => cast_samples(buf),
        DecodingResult::U16(buf) => cast_samples(buf),
        DecodingResult::U32(buf) => cast_samples(buf),
        DecodingResult::I8(buf) => cast_samples(buf),
        DecodingResult::I16(buf) => cast_samples(buf),
        DecodingResult::I32(buf) => cast_samples(buf),
        DecodingResult::F32(buf) => cast_samples(buf),
        DecodingResult::F64(buf) => cast_samples(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-sample images decode interleaved; keep band 1 only.
    let samples = data.len() / (rows * cols).max(1);
    let data = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));

    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
        .and_then(|v| num_traits::cast(v));
    raster.set_nodata(nodata);

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4 matrix
    let t = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION))
        .ok()?;
    if t.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: t[3],
        origin_y: t[7],
        pixel_width: t[0],
        pixel_height: t[5],
        row_rotation: t[1],
        col_rotation: t[4],
    })
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY))
        .ok()?;
    crs_from_geokeys(&keys)
}

/// Find the EPSG code in a GeoKeyDirectory.
///
/// Layout: a 4-entry header `[version, revision, minor, count]` followed by
/// `count` entries of `[key_id, tag_location, count, value]`. Only keys whose
/// value is stored inline (`tag_location == 0`) are considered.
pub fn crs_from_geokeys(keys: &[u16]) -> Option<CRS> {
    let count = *keys.get(3)? as usize;
    keys[4..]
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0 && entry[3] > 0 && entry[3] != 32767)
        .find(|entry| entry[0] == KEY_PROJECTED_CS_TYPE || entry[0] == KEY_GEOGRAPHIC_TYPE)
        .map(|entry| CRS::from_epsg(entry[3] as u32))
}

/// Build a GeoKeyDirectory for an optional CRS
pub(crate) fn geokeys_for(crs: Option<CRS>) -> Result<Vec<u16>> {
    let mut entries: Vec<[u16; 4]> = Vec::with_capacity(3);

    if let Some(crs) = crs {
        let code = u16::try_from(crs.epsg()).map_err(|_| Error::InvalidParameter {
            name: "crs",
            value: crs.to_string(),
            reason: "EPSG code does not fit a GeoKey".into(),
        })?;
        if crs.is_geographic() {
            entries.push([KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
            entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
        } else {
            entries.push([KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([KEY_PROJECTED_CS_TYPE, 0, 1, code]);
        }
    } else {
        entries.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    Ok(keys)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: GeoTiffSample,
    [T]: TiffValue,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<T::Color>(cols as u32, rows as u32)?;

    let gt = raster.transform();
    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TRANSFORMATION), &matrix[..])?;
    }

    let geokeys = geokeys_for(raster.crs())?;
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = format!("{nodata}");
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
    }

    let data: Vec<T> = raster.data().iter().copied().collect();
    image.write_data(&data)?;

    Ok(())
}
