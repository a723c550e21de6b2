//! # s2cluster Cloud
//!
//! Remote access to Sentinel-2 imagery: STAC item search and windowed
//! Cloud Optimized GeoTIFF (COG) reads over HTTP Range requests.
//!
//! Only the tiles that intersect the requested pixel window are fetched,
//! concurrently and through an LRU cache. Points and boxes move between
//! WGS84 and UTM with the pure-Rust projections in [`reproject`].
//!
//! ## Features
//!
//! - `deflate` (default): DEFLATE decompression via `flate2`
//! - `lzw` (default): LZW decompression via `weezl`
//! - `native` (default): blocking API via a current-thread tokio runtime

pub mod cache;
pub mod cog_reader;
pub mod decompress;
pub mod error;
pub mod geotiff_keys;
pub mod http;
pub mod ifd;
pub mod reproject;
pub mod stac_client;
pub mod stac_models;
pub mod tile_index;

pub mod sync_api;

pub use cog_reader::{CogReader, CogReaderOptions};
pub use error::{CloudError, Result};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

/// Blocking API re-exported as `blocking` module.
#[cfg(feature = "native")]
pub mod blocking {
    pub use crate::sync_api::*;
}
