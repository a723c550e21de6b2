//! Square pixel window around a point of interest
//!
//! The point is reprojected into the scene CRS, located on the reference
//! band grid, and a `2 × half_width` square is cut around it. Windows that
//! would cross the grid edge are shifted inward so they always keep their
//! full size.

use s2cluster_cloud::reproject;
use s2cluster_core::raster::{BBox, GeoTransform, PixelWindow};
use s2cluster_core::CRS;
use serde::Serialize;
use tracing::debug;

use crate::error::GeometryError;

/// Pixel grid shared by all bands of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridGeometry {
    pub crs: CRS,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

/// A window placed on a scene grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedWindow {
    pub window: PixelWindow,
    /// Transform of the window's own grid
    pub transform: GeoTransform,
    /// Pixel containing the point of interest, in scene coordinates
    pub center_row: usize,
    pub center_col: usize,
    /// Half-width after clamping
    pub half_width: usize,
    pub geometry: GridGeometry,
}

impl ResolvedWindow {
    /// Side length in pixels.
    pub fn side(&self) -> usize {
        2 * self.half_width
    }

    /// WGS84 envelope of the window's four outer corners.
    pub fn geographic_bounds(&self) -> Result<BBox, GeometryError> {
        let crs = self.geometry.crs;
        let corners = self
            .transform
            .corners(self.window.cols(), self.window.rows())
            .iter()
            .map(|&(x, y)| reproject::transform_point(crs, CRS::wgs84(), x, y))
            .collect::<Option<Vec<_>>>()
            .ok_or(GeometryError::UnsupportedCrs { epsg: crs.epsg() })?;
        BBox::envelope(&corners).ok_or(GeometryError::UnsupportedCrs { epsg: crs.epsg() })
    }
}

/// Place a window of `half_width` pixels around `(lon, lat)` on `geometry`.
///
/// If `2 × half_width` exceeds either grid dimension the half-width drops
/// to `min(width, height) / 4`.
pub fn resolve_window(
    geometry: &GridGeometry,
    lon: f64,
    lat: f64,
    half_width: usize,
) -> Result<ResolvedWindow, GeometryError> {
    let crs = geometry.crs;
    let (x, y) = reproject::transform_point(CRS::wgs84(), crs, lon, lat)
        .ok_or(GeometryError::UnsupportedCrs { epsg: crs.epsg() })?;

    let (col_f, row_f) = geometry.transform.geo_to_pixel(x, y);
    let (col, row) = (col_f.floor(), row_f.floor());
    let outside = GeometryError::PointOutsideScene {
        lon,
        lat,
        width: geometry.width,
        height: geometry.height,
    };
    if !(col.is_finite() && row.is_finite())
        || col < 0.0
        || row < 0.0
        || col >= geometry.width as f64
        || row >= geometry.height as f64
    {
        return Err(outside);
    }
    let (center_col, center_row) = (col as usize, row as usize);

    let mut half_width = half_width;
    if half_width > geometry.width / 2 || half_width > geometry.height / 2 {
        half_width = geometry.width.min(geometry.height) / 4;
        debug!(half_width, "window clamped to a quarter of the grid");
    }
    if half_width == 0 {
        return Err(GeometryError::SceneTooSmall {
            width: geometry.width,
            height: geometry.height,
        });
    }

    let side = 2 * half_width;
    let row_start = center_row
        .saturating_sub(half_width)
        .min(geometry.height - side);
    let col_start = center_col
        .saturating_sub(half_width)
        .min(geometry.width - side);
    let window = PixelWindow::new(row_start, col_start, side, side);
    let transform = geometry.transform.for_window(&window);

    debug!(
        center_row,
        center_col,
        row_start,
        col_start,
        side,
        "resolved window"
    );

    Ok(ResolvedWindow {
        window,
        transform,
        center_row,
        center_col,
        half_width,
        geometry: *geometry,
    })
}
