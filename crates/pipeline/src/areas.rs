//! Area table of a label grid

use s2cluster_algorithms::statistics::{class_areas, ClassArea};
use s2cluster_core::raster::Raster;

use crate::error::{PipelineError, Result};

/// Per-label pixel counts and hectares, ascending label.
pub fn area_table(labels: &Raster<u8>, pixel_area_m2: f64) -> Result<Vec<ClassArea>> {
    class_areas(labels, pixel_area_m2).map_err(PipelineError::Clustering)
}
