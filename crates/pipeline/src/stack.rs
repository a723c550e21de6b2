//! Band reads and the multi-band image stack

use ndarray::{s, Array3};
use s2cluster_cloud::blocking::CogReaderBlocking;
use s2cluster_cloud::CogReaderOptions;
use s2cluster_core::raster::{BBox, GeoTransform, PixelWindow, Raster};
use s2cluster_core::CRS;
use tracing::{debug, info};

use crate::error::{GeometryError, PipelineError, Result};
use crate::scene::Scene;
use crate::window::{GridGeometry, ResolvedWindow};

/// Sentinel-2 10 m bands used for clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
}

impl Band {
    /// Stack order.
    pub const ALL: [Band; 4] = [Band::Blue, Band::Green, Band::Red, Band::Nir];

    /// Band whose grid defines the window.
    pub const REFERENCE: Band = Band::Nir;

    /// Sentinel-2 band designation
    pub fn name(self) -> &'static str {
        match self {
            Band::Blue => "B02",
            Band::Green => "B03",
            Band::Red => "B04",
            Band::Nir => "B08",
        }
    }

    /// Asset keys: band number first, then the common name.
    pub fn asset_keys(self) -> [&'static str; 2] {
        match self {
            Band::Blue => ["B02", "blue"],
            Band::Green => ["B03", "green"],
            Band::Red => ["B04", "red"],
            Band::Nir => ["B08", "nir"],
        }
    }
}

/// Reader of single-band rasters by href.
pub trait BandSource {
    /// Grid of the raster at `href`.
    fn geometry(&self, href: &str) -> Result<GridGeometry>;

    /// Grid of the raster and the samples inside `window`.
    fn read_window(&self, href: &str, window: &PixelWindow) -> Result<(GridGeometry, Raster<f64>)>;
}

/// [`BandSource`] over remote COGs. Each call opens its own reader and drops
/// it before returning.
#[derive(Debug, Clone, Default)]
pub struct CogBandSource {
    options: CogReaderOptions,
}

impl CogBandSource {
    pub fn new(options: CogReaderOptions) -> Self {
        Self { options }
    }

    fn open(&self, href: &str) -> Result<(CogReaderBlocking, GridGeometry)> {
        let reader = CogReaderBlocking::open(href, self.options.clone())?;
        let crs = reader.crs().ok_or_else(|| GeometryError::MissingCrs {
            href: href.to_string(),
        })?;
        let transform = reader
            .geo_transform()
            .ok_or_else(|| GeometryError::MissingTransform {
                href: href.to_string(),
            })?;
        let (width, height) = reader.size();
        Ok((
            reader,
            GridGeometry {
                crs,
                transform,
                width,
                height,
            },
        ))
    }
}

impl BandSource for CogBandSource {
    fn geometry(&self, href: &str) -> Result<GridGeometry> {
        self.open(href).map(|(_, geometry)| geometry)
    }

    fn read_window(&self, href: &str, window: &PixelWindow) -> Result<(GridGeometry, Raster<f64>)> {
        let (mut reader, geometry) = self.open(href)?;
        let raster = reader.read_window::<f64>(window)?;
        Ok((geometry, raster))
    }
}

/// Window samples of every band, `[band, row, col]`.
#[derive(Debug, Clone)]
pub struct ImageStack {
    pub data: Array3<f64>,
    pub bands: Vec<Band>,
    pub crs: CRS,
    /// Transform of the window grid
    pub transform: GeoTransform,
    /// WGS84 envelope of the window
    pub bounds: BBox,
}

impl ImageStack {
    /// `(rows, cols)` of each band slice.
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.data.dim();
        (rows, cols)
    }
}

/// Read the window of each band in [`Band::ALL`] order into one stack.
///
/// Every band must share the reference grid exactly.
pub fn stack_bands<S: BandSource + ?Sized>(
    source: &S,
    scene: &Scene,
    resolved: &ResolvedWindow,
) -> Result<ImageStack> {
    let window = &resolved.window;
    let (rows, cols) = window.shape();
    let mut data = Array3::<f64>::zeros((Band::ALL.len(), rows, cols));

    for (i, band) in Band::ALL.into_iter().enumerate() {
        let href = scene
            .band_href(band)
            .ok_or_else(|| GeometryError::MissingAsset {
                scene: scene.id.clone(),
                band: band.name(),
            })?;
        debug!(band = band.name(), href, "reading band window");

        let (geometry, raster) = source.read_window(href, window)?;
        if geometry != resolved.geometry || raster.shape() != (rows, cols) {
            return Err(PipelineError::Geometry(GeometryError::GridMismatch {
                band: band.name(),
            }));
        }
        data.slice_mut(s![i, .., ..]).assign(raster.data());
    }

    let bounds = resolved.geographic_bounds()?;
    info!(
        "Stacked {} bands of {}x{} pixels from {}",
        Band::ALL.len(),
        rows,
        cols,
        scene.id
    );

    Ok(ImageStack {
        data,
        bands: Band::ALL.to_vec(),
        crs: resolved.geometry.crs,
        transform: resolved.transform,
        bounds,
    })
}
