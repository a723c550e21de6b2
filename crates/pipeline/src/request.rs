//! Request-scoped parameters and pipeline options

use std::path::PathBuf;

use chrono::NaiveDate;
use s2cluster_algorithms::classification::KmeansParams;
use s2cluster_cloud::{CogReaderOptions, StacClientOptions};

use crate::catalog::CatalogProfile;
use crate::error::{PipelineError, Result};

/// Ground footprint of one 10 m Sentinel-2 pixel, in m².
pub const SENTINEL2_PIXEL_AREA_M2: f64 = 100.0;

/// Ground sampling distance of the 10 m bands, in metres.
const SENTINEL2_GSD_M: f64 = 10.0;

/// Window half-width in pixels for a chip of `km` kilometres per side.
///
/// `trunc(km × 1000 / 10 / 2)`, so 1 km gives 50 pixels.
pub fn half_width_from_chip_km(km: f64) -> usize {
    let pixels = km * 1000.0 / SENTINEL2_GSD_M / 2.0;
    if pixels.is_finite() && pixels > 0.0 {
        pixels.trunc() as usize
    } else {
        0
    }
}

/// Where the label raster is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Caller-chosen path, overwritten if present.
    Path(PathBuf),
    /// `s2cluster-<uuid>.tif` in the system temp directory, unique per request.
    #[default]
    TempUnique,
}

impl OutputTarget {
    /// Concrete file path for this target.
    ///
    /// Each call on `TempUnique` yields a fresh name.
    pub fn resolve(&self) -> PathBuf {
        match self {
            Self::Path(p) => p.clone(),
            Self::TempUnique => {
                std::env::temp_dir().join(format!("s2cluster-{}.tif", uuid::Uuid::new_v4()))
            }
        }
    }
}

/// Scene lookup for one point and date range.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Point of interest, WGS84 degrees
    pub lon: f64,
    pub lat: f64,
    /// Acquisition date range, both days inclusive
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Cloud-cover ceiling in percent; scenes must be strictly below it
    pub max_cloud: f64,
}

impl SearchQuery {
    pub fn validate(&self) -> Result<()> {
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(invalid("lon", format!("{} is outside [-180, 180]", self.lon)));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(invalid("lat", format!("{} is outside [-90, 90]", self.lat)));
        }
        if self.end <= self.start {
            return Err(invalid(
                "end",
                format!("{} must be after start date {}", self.end, self.start),
            ));
        }
        if !(0.0..=100.0).contains(&self.max_cloud) {
            return Err(invalid(
                "max_cloud",
                format!("{} is outside [0, 100]", self.max_cloud),
            ));
        }
        Ok(())
    }
}

/// One clustering request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRequest {
    /// Point of interest, WGS84 degrees
    pub lon: f64,
    pub lat: f64,
    /// Acquisition date range, both days inclusive
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Cloud-cover ceiling in percent; scenes must be strictly below it
    pub max_cloud: f64,
    /// Window half-width in pixels
    pub half_width: usize,
    /// Number of clusters
    pub k: usize,
    /// Fixed k-means seed; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub output: OutputTarget,
}

impl ClusterRequest {
    /// The scene lookup part of this request.
    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            lon: self.lon,
            lat: self.lat,
            start: self.start,
            end: self.end,
            max_cloud: self.max_cloud,
        }
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        self.search_query().validate()?;
        if self.half_width == 0 {
            return Err(invalid("half_width", "must be at least 1 pixel".into()));
        }
        if self.k == 0 {
            return Err(invalid("k", "must be at least 1".into()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> PipelineError {
    PipelineError::InvalidRequest { field, reason }
}

/// Service endpoints and tuning shared by requests.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub profile: CatalogProfile,
    pub stac: StacClientOptions,
    pub cog: CogReaderOptions,
    /// k-means tuning; `k` and `seed` are taken from each request
    pub kmeans: KmeansParams,
    pub pixel_area_m2: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            profile: CatalogProfile::default(),
            stac: StacClientOptions::default(),
            cog: CogReaderOptions::default(),
            kmeans: KmeansParams::default(),
            pixel_area_m2: SENTINEL2_PIXEL_AREA_M2,
        }
    }
}
