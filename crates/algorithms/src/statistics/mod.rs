//! Statistics over classified rasters
//!
//! - **areas**: pixel counts and hectares per class label

pub mod areas;

pub use areas::{class_areas, total_hectares, ClassArea, M2_PER_HECTARE};
