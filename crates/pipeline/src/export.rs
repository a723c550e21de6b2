//! Label raster export

use std::path::{Path, PathBuf};

use s2cluster_core::io::write_geotiff;
use s2cluster_core::raster::Raster;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Write `labels` as a single-band `u8` GeoTIFF, replacing any existing file.
pub fn export_clusters(labels: &Raster<u8>, path: &Path) -> Result<PathBuf> {
    write_geotiff(labels, path).map_err(PipelineError::Write)?;
    info!("Wrote {}x{} label raster to {}", labels.cols(), labels.rows(), path.display());
    Ok(path.to_path_buf())
}
