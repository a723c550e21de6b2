//! Unsupervised classification of multi-band pixels
//!
//! - **Scaling**: per-band min-max normalization to `[0, 1]`
//! - **K-means**: k-means++ seeded Lloyd clustering, best of several runs

mod kmeans;
mod scaling;

pub use kmeans::{kmeans, KmeansParams, KmeansResult};
pub use scaling::{min_max_scale, BandRange};
