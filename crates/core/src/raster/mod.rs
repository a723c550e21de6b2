//! Raster data structures and georeferencing

mod bbox;
mod element;
mod geotransform;
mod grid;
mod window;

pub use bbox::BBox;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use window::PixelWindow;
