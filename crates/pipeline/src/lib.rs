//! # s2cluster Pipeline
//!
//! Unsupervised land-cover clustering of a Sentinel-2 chip:
//!
//! 1. find the least-cloudy L2A scene over a point ([`catalog`])
//! 2. place a square pixel window around the point ([`window`])
//! 3. read the B02/B03/B04/B08 window from the scene's COGs ([`stack`])
//! 4. min-max scale the pixels and run k-means ([`clustering`])
//! 5. tabulate hectares per class ([`areas`])
//! 6. write the labels as a `u8` GeoTIFF ([`export`])
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use s2cluster_pipeline::{run, ClusterOutcome, ClusterRequest, OutputTarget, PipelineOptions};
//!
//! let request = ClusterRequest {
//!     lon: -3.7038,
//!     lat: 40.4168,
//!     start: NaiveDate::from_ymd_opt(2021, 7, 15).unwrap(),
//!     end: NaiveDate::from_ymd_opt(2021, 8, 15).unwrap(),
//!     max_cloud: 10.0,
//!     half_width: 50,
//!     k: 5,
//!     seed: Some(42),
//!     output: OutputTarget::TempUnique,
//! };
//! if let ClusterOutcome::Clustered(result) = run(&request, PipelineOptions::default())? {
//!     println!("{}", result.output_path.display());
//! }
//! # Ok::<(), s2cluster_pipeline::PipelineError>(())
//! ```

pub mod areas;
pub mod catalog;
pub mod clustering;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod request;
pub mod scene;
pub mod stack;
pub mod window;

pub use catalog::{CatalogProfile, CatalogSearch, SceneCatalog, StacSceneCatalog};
pub use error::{GeometryError, PipelineError, Result};
pub use pipeline::{run, ClusterOutcome, ClusterResult, ClusterSummary, Pipeline, Stage};
pub use request::{
    half_width_from_chip_km, ClusterRequest, OutputTarget, PipelineOptions, SearchQuery,
};
pub use scene::Scene;
pub use stack::{Band, BandSource, CogBandSource, ImageStack};
pub use window::{resolve_window, GridGeometry, ResolvedWindow};
