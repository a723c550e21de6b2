//! Pixel clustering of an image stack into a label grid

use ndarray::{Array2, Axis};
use s2cluster_algorithms::classification::{kmeans, min_max_scale, KmeansParams};
use s2cluster_core::raster::Raster;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::stack::ImageStack;

/// Largest k that fits 8-bit labels.
pub const MAX_CLASSES: usize = u8::MAX as usize + 1;

/// Flatten `[band, row, col]` into a `pixels × bands` matrix, row-major pixels.
pub fn pixel_matrix(stack: &ImageStack) -> Array2<f64> {
    let (bands, rows, cols) = stack.data.dim();
    let mut matrix = Array2::<f64>::zeros((rows * cols, bands));
    for (b, plane) in stack.data.axis_iter(Axis(0)).enumerate() {
        for (dst, &v) in matrix.column_mut(b).iter_mut().zip(plane.iter()) {
            *dst = v;
        }
    }
    matrix
}

/// Scale, cluster and reshape the stack into a `u8` label raster.
///
/// The grid has the window's `(rows, cols)` and carries its transform and
/// CRS.
pub fn cluster_stack(stack: &ImageStack, params: &KmeansParams) -> Result<Raster<u8>> {
    if params.k > MAX_CLASSES {
        return Err(PipelineError::InvalidRequest {
            field: "k",
            reason: format!("{} exceeds the {MAX_CLASSES} labels of an 8-bit raster", params.k),
        });
    }

    let (rows, cols) = stack.shape();
    let mut matrix = pixel_matrix(stack);
    let ranges = min_max_scale(&mut matrix);
    debug!(?ranges, "band ranges before scaling");

    let fit = kmeans(matrix.view(), params).map_err(PipelineError::Clustering)?;
    info!(
        "k-means: k={}, {} iterations, inertia {:.4}",
        params.k, fit.iterations, fit.inertia
    );

    let labels: Vec<u8> = fit.labels.iter().map(|&l| l as u8).collect();
    let grid = Raster::from_vec(labels, rows, cols)
        .map_err(PipelineError::Clustering)?
        .with_transform(stack.transform)
        .with_crs(Some(stack.crs));
    Ok(grid)
}
