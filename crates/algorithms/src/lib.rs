//! # s2cluster Algorithms
//!
//! Pixel clustering and class statistics for s2cluster.
//!
//! ## Available Algorithm Categories
//!
//! - **classification**: min-max scaling, multi-band k-means
//! - **statistics**: per-class pixel counts and areas

pub mod classification;
pub mod statistics;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{kmeans, min_max_scale, BandRange, KmeansParams, KmeansResult};
    pub use crate::statistics::{class_areas, total_hectares, ClassArea};
    pub use s2cluster_core::prelude::*;
}
