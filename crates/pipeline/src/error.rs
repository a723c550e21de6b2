//! Error types for the clustering pipeline.
//!
//! A search that matches no scene is not an error; it is reported as
//! [`ClusterOutcome::NoScene`](crate::ClusterOutcome::NoScene).

use s2cluster_cloud::CloudError;
use thiserror::Error;

/// Failures that abort a request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(#[from] CloudError),

    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to write output: {0}")]
    Write(#[source] s2cluster_core::Error),

    #[error("invalid request: {field} {reason}")]
    InvalidRequest { field: &'static str, reason: String },

    #[error("clustering failed: {0}")]
    Clustering(#[source] s2cluster_core::Error),
}

/// The scene's grid cannot serve the requested window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("unsupported CRS EPSG:{epsg}")]
    UnsupportedCrs { epsg: u32 },

    #[error("point ({lon}, {lat}) falls outside the {width}x{height} scene grid")]
    PointOutsideScene {
        lon: f64,
        lat: f64,
        width: usize,
        height: usize,
    },

    #[error("scene grid {width}x{height} is too small for a window")]
    SceneTooSmall { width: usize, height: usize },

    #[error("band {band} grid differs from the reference band")]
    GridMismatch { band: &'static str },

    #[error("scene {scene} has no {band} asset")]
    MissingAsset { scene: String, band: &'static str },

    #[error("raster {href} carries no CRS")]
    MissingCrs { href: String },

    #[error("raster {href} carries no geotransform")]
    MissingTransform { href: String },
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
