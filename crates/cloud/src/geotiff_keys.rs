//! GeoTIFF metadata from a resolved IFD.
//!
//! Reads tags 33550 (ModelPixelScale), 33922 (ModelTiepoint),
//! 34264 (ModelTransformation), 34735 (GeoKeyDirectory), and
//! 42113 (GDAL_NODATA) to produce a `GeoTransform`, optional `CRS`,
//! and optional nodata value.

use s2cluster_core::crs::CRS;
use s2cluster_core::io::crs_from_geokeys;
use s2cluster_core::raster::GeoTransform;

use crate::ifd::{tags, TagSet};

/// GeoTIFF metadata of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffMeta {
    /// `None` when the file carries no georeferencing tags.
    pub geo_transform: Option<GeoTransform>,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
}

impl GeoTiffMeta {
    /// Decode from a tag set whose [`tags::GEO`] values are attached.
    pub fn from_tags(set: &TagSet) -> Self {
        Self {
            geo_transform: geotransform(set),
            crs: set
                .u64s(tags::GEO_KEY_DIRECTORY)
                .and_then(|keys| {
                    keys.into_iter()
                        .map(|k| u16::try_from(k).ok())
                        .collect::<Option<Vec<u16>>>()
                })
                .and_then(|keys| crs_from_geokeys(&keys)),
            nodata: set
                .ascii(tags::GDAL_NODATA)
                .and_then(|s| s.trim().parse::<f64>().ok()),
        }
    }
}

fn geotransform(set: &TagSet) -> Option<GeoTransform> {
    let scale = set.f64s(tags::MODEL_PIXEL_SCALE);
    let tiepoint = set.f64s(tags::MODEL_TIEPOINT);

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major: x = t[3] + col * t[0] + row * t[1], y = t[7] + col * t[4] + row * t[5]
    let t = set.f64s(tags::MODEL_TRANSFORMATION)?;
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
