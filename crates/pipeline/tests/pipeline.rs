//! End-to-end runs against an in-memory catalog and band source.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use ndarray::{s, Array2};
use serde_json::json;

use s2cluster_algorithms::statistics::total_hectares;
use s2cluster_cloud::reproject::transform_point;
use s2cluster_cloud::{CloudError, StacItem, StacItemCollection, StacLink, StacSearchParams};
use s2cluster_core::io::read_geotiff;
use s2cluster_core::raster::{GeoTransform, PixelWindow, Raster};
use s2cluster_core::CRS;
use s2cluster_pipeline::{
    BandSource, ClusterOutcome, ClusterRequest, GeometryError, GridGeometry, OutputTarget,
    Pipeline, PipelineError, PipelineOptions, SceneCatalog, Stage,
};

const SIZE: usize = 200;

// ── Fakes ──────────────────────────────────────────────────────────────

struct FakeCatalog {
    items: Vec<StacItem>,
    calls: Cell<usize>,
    /// Fail every search with a network error
    offline: bool,
}

impl FakeCatalog {
    fn new(items: Vec<StacItem>) -> Self {
        Self {
            items,
            calls: Cell::new(0),
            offline: false,
        }
    }

    fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new(Vec::new())
        }
    }
}

impl SceneCatalog for &FakeCatalog {
    fn search(&self, _params: &StacSearchParams) -> Result<StacItemCollection, CloudError> {
        self.calls.set(self.calls.get() + 1);
        if self.offline {
            return Err(CloudError::Network("connection refused".into()));
        }
        Ok(serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": self.items,
            "links": []
        }))
        .unwrap())
    }

    fn next_page(
        &self,
        link: &StacLink,
        _params: &StacSearchParams,
    ) -> Result<StacItemCollection, CloudError> {
        Err(CloudError::Network(format!("unexpected page request {}", link.href)))
    }
}

struct FakeBands {
    rasters: HashMap<String, (GridGeometry, Array2<f64>)>,
}

impl BandSource for FakeBands {
    fn geometry(&self, href: &str) -> s2cluster_pipeline::Result<GridGeometry> {
        self.rasters
            .get(href)
            .map(|(g, _)| *g)
            .ok_or_else(|| CloudError::Network(format!("404 {href}")).into())
    }

    fn read_window(
        &self,
        href: &str,
        window: &PixelWindow,
    ) -> s2cluster_pipeline::Result<(GridGeometry, Raster<f64>)> {
        let (geometry, data) = self
            .rasters
            .get(href)
            .ok_or_else(|| CloudError::Network(format!("404 {href}")))?;
        let block = data
            .slice(s![window.row_start..window.row_stop, window.col_start..window.col_stop])
            .to_owned();
        let raster = Raster::from_array(block)
            .with_transform(geometry.transform.for_window(window))
            .with_crs(Some(geometry.crs));
        Ok((*geometry, raster))
    }
}

// ── Fixtures ───────────────────────────────────────────────────────────

fn geometry() -> GridGeometry {
    GridGeometry {
        crs: CRS::from_epsg(32630),
        transform: GeoTransform::new(400_000.0, 4_500_000.0, 10.0, -10.0),
        width: SIZE,
        height: SIZE,
    }
}

/// WGS84 position of the centre of scene pixel (100, 100).
fn point() -> (f64, f64) {
    let (x, y) = geometry().transform.pixel_to_geo(100, 100);
    transform_point(CRS::from_epsg(32630), CRS::wgs84(), x, y).unwrap()
}

fn item(id: &str, cloud: f64, bands: &[&str]) -> StacItem {
    let assets: serde_json::Map<_, _> = bands
        .iter()
        .map(|b| (b.to_string(), json!({ "href": format!("mem://{id}/{b}.tif") })))
        .collect();
    serde_json::from_value(json!({
        "type": "Feature",
        "id": id,
        "properties": {
            "datetime": "2021-07-28T11:07:01Z",
            "eo:cloud_cover": cloud,
            "proj:epsg": 32630
        },
        "assets": assets
    }))
    .unwrap()
}

/// Five horizontal 20-row blocks across the window rows 50..150, each with
/// its own spectral signature.
fn synthetic_band(band: usize) -> Array2<f64> {
    Array2::from_shape_fn((SIZE, SIZE), |(r, _)| {
        let block = ((r as i64 - 50).rem_euclid(100) / 20) as f64;
        500.0 + block * 900.0 + band as f64 * 37.0 * (block + 1.0)
    })
}

fn bands_for(id: &str) -> FakeBands {
    let rasters = ["B02", "B03", "B04", "B08"]
        .iter()
        .enumerate()
        .map(|(i, b)| (format!("mem://{id}/{b}.tif"), (geometry(), synthetic_band(i))))
        .collect();
    FakeBands { rasters }
}

fn request(output: PathBuf) -> ClusterRequest {
    let (lon, lat) = point();
    ClusterRequest {
        lon,
        lat,
        start: NaiveDate::from_ymd_opt(2021, 7, 15).unwrap(),
        end: NaiveDate::from_ymd_opt(2021, 8, 15).unwrap(),
        max_cloud: 10.0,
        half_width: 50,
        k: 5,
        seed: Some(42),
        output: OutputTarget::Path(output),
    }
}

const ALL_BANDS: [&str; 4] = ["B02", "B03", "B04", "B08"];

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn test_five_block_scene_gives_five_classes_of_20_ha() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let mut stages = Vec::new();
    let outcome = pipeline
        .run_with(&request(out.clone()), |s| stages.push(s))
        .unwrap();
    let ClusterOutcome::Clustered(result) = outcome else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(
        stages,
        vec![
            Stage::Searching,
            Stage::ResolvingWindow,
            Stage::ReadingBands,
            Stage::Clustering,
            Stage::Exporting
        ]
    );
    assert_eq!(result.scene.id, "S2A_TEST");
    assert_eq!(result.window.window, PixelWindow::new(50, 50, 100, 100));
    assert_eq!(result.labels.shape(), (100, 100));

    // each 20-row block carries one label, and the five labels differ
    let mut block_labels = Vec::new();
    for block in 0..5 {
        let label = result.labels.get(block * 20, 0).unwrap();
        for r in block * 20..(block + 1) * 20 {
            for c in 0..100 {
                assert_eq!(result.labels.get(r, c).unwrap(), label);
            }
        }
        block_labels.push(label);
    }
    block_labels.sort_unstable();
    assert_eq!(block_labels, vec![0, 1, 2, 3, 4]);

    assert_eq!(result.areas.len(), 5);
    for (i, area) in result.areas.iter().enumerate() {
        assert_eq!(area.label as usize, i);
        assert_eq!(area.pixels, 2000);
        assert_relative_eq!(area.hectares, 20.0);
    }
    assert_relative_eq!(total_hectares(&result.areas), 100.0);

    let b = result.bounds;
    assert!(b.contains(point().0, point().1));

    assert_eq!(result.output_path, out);
    let back: Raster<u8> = read_geotiff(&out).unwrap();
    assert_eq!(back.data(), result.labels.data());
    assert_eq!(back.transform(), &result.window.transform);
    assert_eq!(back.crs(), Some(CRS::from_epsg(32630)));
}

#[test]
fn test_no_scene_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::new(Vec::new());
    let pipeline = Pipeline::new(&catalog, bands_for("none"), PipelineOptions::default());

    let outcome = pipeline.run(&request(out.clone())).unwrap();
    assert!(matches!(outcome, ClusterOutcome::NoScene));
    assert!(!out.exists());
    assert_eq!(catalog.calls.get(), 1);
}

#[test]
fn test_least_cloudy_scene_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::new(vec![
        item("CLOUDY", 8.0, &ALL_BANDS),
        item("CLEAR", 0.5, &ALL_BANDS),
    ]);
    // only the clear scene's rasters exist
    let pipeline = Pipeline::new(&catalog, bands_for("CLEAR"), PipelineOptions::default());

    let outcome = pipeline.run(&request(dir.path().join("c.tif"))).unwrap();
    match outcome {
        ClusterOutcome::Clustered(r) => assert_eq!(r.scene.id, "CLEAR"),
        ClusterOutcome::NoScene => panic!("expected a scene"),
    }
}

#[test]
fn test_invalid_request_never_searches() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let mut req = request(dir.path().join("c.tif"));
    req.end = req.start;
    let err = pipeline.run(&req).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest { field: "end", .. }));
    assert_eq!(catalog.calls.get(), 0);
}

#[test]
fn test_missing_band_asset_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &["B02", "B04", "B08"])]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let err = pipeline.run(&request(out.clone())).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Geometry(GeometryError::MissingAsset { band: "B03", .. })
    ));
    assert!(!out.exists());
}

#[test]
fn test_catalog_failure_is_transport_error_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::offline();
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let err = pipeline.run(&request(out.clone())).unwrap_err();
    assert!(matches!(err, PipelineError::Transport(CloudError::Network(_))));
    assert!(!out.exists());
    assert_eq!(catalog.calls.get(), 1);
}

#[test]
fn test_band_read_failure_is_transport_error_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    // the asset is listed but its file cannot be fetched
    let mut bands = bands_for("S2A_TEST");
    bands.rasters.remove("mem://S2A_TEST/B03.tif");
    let pipeline = Pipeline::new(&catalog, bands, PipelineOptions::default());

    let err = pipeline.run(&request(out.clone())).unwrap_err();
    assert!(matches!(err, PipelineError::Transport(CloudError::Network(_))));
    assert!(!out.exists());
}

#[test]
fn test_find_scene_alone_reads_no_bands() {
    let catalog = FakeCatalog::new(vec![
        item("CLOUDY", 8.0, &ALL_BANDS),
        item("CLEAR", 0.5, &ALL_BANDS),
    ]);
    let bands = FakeBands { rasters: HashMap::new() };
    let pipeline = Pipeline::new(&catalog, bands, PipelineOptions::default());

    let dir = tempfile::tempdir().unwrap();
    let query = request(dir.path().join("c.tif")).search_query();
    let scene = pipeline.find_scene(&query).unwrap().unwrap();
    assert_eq!(scene.id, "CLEAR");
    assert_eq!(catalog.calls.get(), 1);
}

#[test]
fn test_band_on_other_grid_is_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("clusters.tif");
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let mut bands = bands_for("S2A_TEST");
    let shifted = GridGeometry {
        transform: GeoTransform::new(400_010.0, 4_500_000.0, 10.0, -10.0),
        ..geometry()
    };
    bands
        .rasters
        .insert("mem://S2A_TEST/B04.tif".into(), (shifted, synthetic_band(2)));
    let pipeline = Pipeline::new(&catalog, bands, PipelineOptions::default());

    let err = pipeline.run(&request(out.clone())).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Geometry(GeometryError::GridMismatch { band: "B04" })
    ));
    assert!(!out.exists());
}

#[test]
fn test_point_outside_scene() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let mut req = request(dir.path().join("c.tif"));
    req.lat += 0.5;
    let err = pipeline.run(&req).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Geometry(GeometryError::PointOutsideScene { .. })
    ));
}

#[test]
fn test_oversized_window_clamped_to_quarter() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let mut req = request(dir.path().join("c.tif"));
    req.half_width = 500;
    req.k = 3;
    let ClusterOutcome::Clustered(result) = pipeline.run(&req).unwrap() else {
        panic!("expected a clustered outcome");
    };
    assert_eq!(result.window.half_width, SIZE / 4);
    assert_eq!(result.labels.shape(), (100, 100));
}

#[test]
fn test_seeded_runs_repeat() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::new(vec![item("S2A_TEST", 3.0, &ALL_BANDS)]);
    let pipeline = Pipeline::new(&catalog, bands_for("S2A_TEST"), PipelineOptions::default());

    let mut req = request(dir.path().join("a.tif"));
    req.k = 3;
    let first = pipeline.run(&req).unwrap();
    req.output = OutputTarget::Path(dir.path().join("b.tif"));
    let second = pipeline.run(&req).unwrap();

    match (first, second) {
        (ClusterOutcome::Clustered(a), ClusterOutcome::Clustered(b)) => {
            assert_eq!(a.labels.data(), b.labels.data());
        }
        _ => panic!("expected clustered outcomes"),
    }
}

#[test]
#[ignore] // requires network access
fn test_remote_madrid_chip() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("madrid.tif");
    let req = ClusterRequest {
        lon: -3.7038,
        lat: 40.4168,
        start: NaiveDate::from_ymd_opt(2021, 7, 15).unwrap(),
        end: NaiveDate::from_ymd_opt(2021, 8, 15).unwrap(),
        max_cloud: 10.0,
        half_width: 50,
        k: 5,
        seed: Some(1),
        output: OutputTarget::Path(out.clone()),
    };

    match s2cluster_pipeline::run(&req, PipelineOptions::default()).unwrap() {
        ClusterOutcome::Clustered(result) => {
            assert_eq!(result.labels.shape(), (100, 100));
            assert_relative_eq!(total_hectares(&result.areas), 100.0);
            assert!(out.exists());
        }
        ClusterOutcome::NoScene => eprintln!("no scene found for Madrid, summer 2021"),
    }
}
