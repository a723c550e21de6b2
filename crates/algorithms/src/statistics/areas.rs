//! Per-class pixel counts and areas
//!
//! Turns a label raster into an area table: one row per label present,
//! in ascending label order.

use serde::Serialize;
use s2cluster_core::raster::Raster;
use s2cluster_core::{Error, Result};

/// Square metres per hectare
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// Area covered by one class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassArea {
    pub label: u8,
    pub pixels: usize,
    pub hectares: f64,
}

/// Count pixels per label and convert to hectares.
///
/// `hectares = pixels × pixel_area_m2 / 10 000`. Cells equal to the
/// raster's nodata value, if one is set, are not counted.
///
/// # Errors
/// `pixel_area_m2` must be finite and positive.
pub fn class_areas(labels: &Raster<u8>, pixel_area_m2: f64) -> Result<Vec<ClassArea>> {
    if !(pixel_area_m2.is_finite() && pixel_area_m2 > 0.0) {
        return Err(Error::InvalidParameter {
            name: "pixel_area_m2",
            value: pixel_area_m2.to_string(),
            reason: "must be a positive finite area".into(),
        });
    }

    let nodata = labels.nodata();
    let mut counts = [0usize; 256];
    for &label in labels.data().iter() {
        if Some(label) != nodata {
            counts[label as usize] += 1;
        }
    }

    Ok((0..=u8::MAX)
        .zip(counts)
        .filter(|&(_, pixels)| pixels > 0)
        .map(|(label, pixels)| ClassArea {
            label,
            pixels,
            hectares: pixels as f64 * pixel_area_m2 / M2_PER_HECTARE,
        })
        .collect())
}

/// Sum of the hectares column.
pub fn total_hectares(table: &[ClassArea]) -> f64 {
    table.iter().map(|a| a.hectares).sum()
}
