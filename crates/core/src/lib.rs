//! # s2cluster core
//!
//! Core types and I/O shared by the s2cluster crates.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid
//! - `GeoTransform`: affine pixel ↔ ground mapping
//! - `PixelWindow`: rectangular pixel region of a parent grid
//! - `BBox`: axis-aligned bounding box
//! - `CRS`: EPSG-based coordinate reference system
//! - native GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BBox, GeoTransform, PixelWindow, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BBox, GeoTransform, PixelWindow, Raster, RasterElement};
}
