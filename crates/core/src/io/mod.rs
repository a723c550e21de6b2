//! I/O operations for reading and writing geospatial data

mod geotiff;

pub use geotiff::{crs_from_geokeys, read_geotiff, write_geotiff, GeoTiffSample};
