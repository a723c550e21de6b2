//! End-to-end request driver

use std::path::PathBuf;

use s2cluster_algorithms::classification::KmeansParams;
use s2cluster_algorithms::statistics::ClassArea;
use s2cluster_core::raster::{BBox, Raster};
use serde::Serialize;
use tracing::info;

use crate::areas::area_table;
use crate::catalog::{CatalogSearch, SceneCatalog, StacSceneCatalog};
use crate::clustering::cluster_stack;
use crate::error::{GeometryError, Result};
use crate::export::export_clusters;
use crate::request::{ClusterRequest, PipelineOptions, SearchQuery};
use crate::scene::Scene;
use crate::stack::{stack_bands, Band, BandSource, CogBandSource};
use crate::window::{resolve_window, ResolvedWindow};

/// Stage about to start, reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    ResolvingWindow,
    ReadingBands,
    Clustering,
    Exporting,
}

impl Stage {
    pub fn describe(self) -> &'static str {
        match self {
            Stage::Searching => "Searching catalog...",
            Stage::ResolvingWindow => "Locating window...",
            Stage::ReadingBands => "Reading bands...",
            Stage::Clustering => "Clustering pixels...",
            Stage::Exporting => "Writing label raster...",
        }
    }
}

/// Everything produced by a successful request.
#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub scene: Scene,
    pub window: ResolvedWindow,
    /// WGS84 envelope of the window
    pub bounds: BBox,
    pub labels: Raster<u8>,
    pub areas: Vec<ClassArea>,
    pub output_path: PathBuf,
}

impl ClusterResult {
    /// Serializable summary: scene, window, bounds, areas and output path.
    pub fn summary(&self) -> ClusterSummary<'_> {
        ClusterSummary {
            scene_id: &self.scene.id,
            cloud_cover: self.scene.cloud_cover,
            datetime: self.scene.datetime.as_deref(),
            epsg: self.window.geometry.crs.epsg(),
            window: &self.window,
            bounds: self.bounds,
            areas: &self.areas,
            output_path: &self.output_path,
        }
    }
}

/// JSON view of a [`ClusterResult`].
#[derive(Debug, Serialize)]
pub struct ClusterSummary<'a> {
    pub scene_id: &'a str,
    pub cloud_cover: f64,
    pub datetime: Option<&'a str>,
    pub epsg: u32,
    pub window: &'a ResolvedWindow,
    pub bounds: BBox,
    pub areas: &'a [ClassArea],
    pub output_path: &'a PathBuf,
}

/// Outcome of a request that did not fail.
#[derive(Debug, Clone)]
pub enum ClusterOutcome {
    /// No scene matched the search; nothing was written.
    NoScene,
    Clustered(Box<ClusterResult>),
}

/// Search → window → stack → cluster → areas → export.
pub struct Pipeline<C, B> {
    search: CatalogSearch<C>,
    bands: B,
    options: PipelineOptions,
}

impl Pipeline<StacSceneCatalog, CogBandSource> {
    /// Pipeline against the configured STAC API and remote COGs.
    pub fn remote(options: PipelineOptions) -> Result<Self> {
        let catalog = StacSceneCatalog::new(&options.profile, options.stac.clone())?;
        let bands = CogBandSource::new(options.cog.clone());
        Ok(Self::new(catalog, bands, options))
    }
}

impl<C: SceneCatalog, B: BandSource> Pipeline<C, B> {
    pub fn new(catalog: C, bands: B, options: PipelineOptions) -> Self {
        let search = CatalogSearch::new(catalog, options.profile.clone());
        Self {
            search,
            bands,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Least-cloudy scene for a point and date range, without clustering.
    pub fn find_scene(&self, query: &SearchQuery) -> Result<Option<Scene>> {
        query.validate()?;
        self.search.find_scene(query)
    }

    pub fn run(&self, request: &ClusterRequest) -> Result<ClusterOutcome> {
        self.run_with(request, |_| {})
    }

    /// Run the request, calling `on_stage` before each stage.
    ///
    /// The output file is only written once clustering and the area table
    /// have succeeded.
    pub fn run_with(
        &self,
        request: &ClusterRequest,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<ClusterOutcome> {
        request.validate()?;

        on_stage(Stage::Searching);
        let Some(scene) = self.search.find_scene(&request.search_query())? else {
            return Ok(ClusterOutcome::NoScene);
        };

        on_stage(Stage::ResolvingWindow);
        let reference = scene
            .band_href(Band::REFERENCE)
            .ok_or_else(|| GeometryError::MissingAsset {
                scene: scene.id.clone(),
                band: Band::REFERENCE.name(),
            })?;
        let geometry = self.bands.geometry(reference)?;
        let window = resolve_window(&geometry, request.lon, request.lat, request.half_width)?;
        info!(
            "Window rows {}..{}, cols {}..{} of {}x{} grid (EPSG:{})",
            window.window.row_start,
            window.window.row_stop,
            window.window.col_start,
            window.window.col_stop,
            geometry.width,
            geometry.height,
            geometry.crs.epsg()
        );

        on_stage(Stage::ReadingBands);
        let stack = stack_bands(&self.bands, &scene, &window)?;

        on_stage(Stage::Clustering);
        let params = KmeansParams {
            k: request.k,
            seed: request.seed,
            ..self.options.kmeans.clone()
        };
        let labels = cluster_stack(&stack, &params)?;
        let areas = area_table(&labels, self.options.pixel_area_m2)?;

        on_stage(Stage::Exporting);
        let output_path = export_clusters(&labels, &request.output.resolve())?;

        Ok(ClusterOutcome::Clustered(Box::new(ClusterResult {
            scene,
            window,
            bounds: stack.bounds,
            labels,
            areas,
            output_path,
        })))
    }
}

/// One-shot request against the live catalog.
pub fn run(request: &ClusterRequest, options: PipelineOptions) -> Result<ClusterOutcome> {
    Pipeline::remote(options)?.run(request)
}
