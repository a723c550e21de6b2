//! s2cluster CLI - unsupervised land-cover clustering of Sentinel-2 chips

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use s2cluster_algorithms::statistics::{class_areas, total_hectares, ClassArea};
use s2cluster_core::io::read_geotiff;
use s2cluster_core::Raster;
use s2cluster_pipeline::{
    half_width_from_chip_km, CatalogProfile, ClusterOutcome, ClusterRequest, OutputTarget,
    Pipeline, PipelineOptions, Scene, SearchQuery,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "s2cluster")]
#[command(author, version, about = "K-means land-cover clustering of Sentinel-2 imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the least-cloudy Sentinel-2 scene over a point
    Search {
        #[command(flatten)]
        query: SceneQuery,
    },
    /// Cluster a chip around a point and write the labels as GeoTIFF
    Cluster {
        #[command(flatten)]
        query: SceneQuery,
        /// Chip size in kilometres (1-10)
        #[arg(long, default_value = "1", conflicts_with = "half_width")]
        chip_km: f64,
        /// Window half-width in pixels, instead of --chip-km
        #[arg(long)]
        half_width: Option<usize>,
        /// Number of clusters (2-10)
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u8).range(2..=10))]
        k: u8,
        /// Fixed random seed for reproducible labels
        #[arg(long)]
        seed: Option<u64>,
        /// Output GeoTIFF (default: unique file in the temp directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write scene, window, bounds and areas as JSON
        #[arg(long)]
        areas_json: Option<PathBuf>,
    },
    /// Show size, georeference and class areas of a label raster
    Inspect {
        /// Label GeoTIFF written by `cluster`
        input: PathBuf,
    },
}

#[derive(Args)]
struct SceneQuery {
    /// Longitude of the point of interest (WGS84 degrees)
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
    /// Latitude of the point of interest (WGS84 degrees)
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,
    /// First acquisition day (YYYY-MM-DD)
    #[arg(long, default_value = "2021-07-15")]
    start: NaiveDate,
    /// Last acquisition day, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = "2021-08-15")]
    end: NaiveDate,
    /// Cloud-cover ceiling in percent (0-50)
    #[arg(long, default_value = "10")]
    max_cloud: f64,
    /// Catalog: v0, v1 or a STAC API URL
    #[arg(long, default_value = "v0")]
    catalog: String,
}

impl SceneQuery {
    fn validate(&self) -> Result<()> {
        if !(0.0..=50.0).contains(&self.max_cloud) {
            anyhow::bail!("--max-cloud must be between 0 and 50, got {}", self.max_cloud);
        }
        Ok(())
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            profile: CatalogProfile::from_str_or_url(&self.catalog),
            ..Default::default()
        }
    }

    fn search_query(&self) -> SearchQuery {
        SearchQuery {
            lon: self.lon,
            lat: self.lat,
            start: self.start,
            end: self.end,
            max_cloud: self.max_cloud,
        }
    }

    fn request(&self, half_width: usize, k: usize, seed: Option<u64>, output: OutputTarget) -> ClusterRequest {
        let SearchQuery { lon, lat, start, end, max_cloud } = self.search_query();
        ClusterRequest {
            lon,
            lat,
            start,
            end,
            max_cloud,
            half_width,
            k,
            seed,
            output,
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber was already set");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn chip_half_width(chip_km: f64, half_width: Option<usize>) -> Result<usize> {
    match half_width {
        Some(hw) => Ok(hw),
        None => {
            if !(1.0..=10.0).contains(&chip_km) {
                anyhow::bail!("--chip-km must be between 1 and 10, got {}", chip_km);
            }
            Ok(half_width_from_chip_km(chip_km))
        }
    }
}

fn print_scene(scene: &Scene) {
    println!("Scene: {}", scene.id);
    if let Some(dt) = &scene.datetime {
        println!("  Acquired: {}", dt);
    }
    println!("  Cloud cover: {:.2}%", scene.cloud_cover);
    if let Some(epsg) = scene.epsg {
        println!("  CRS: EPSG:{}", epsg);
    }
    for (key, href) in &scene.assets {
        println!("  {:<10} {}", key, href);
    }
}

fn print_areas(areas: &[ClassArea]) {
    println!("\n  Class    Pixels    Hectares");
    for a in areas {
        println!("  {:>5} {:>9} {:>11.2}", a.label, a.pixels, a.hectares);
    }
    println!("  {:>5} {:>9} {:>11.2}", "total", areas.iter().map(|a| a.pixels).sum::<usize>(), total_hectares(areas));
}

fn read_labels(path: &Path) -> Result<Raster<u8>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<u8> = read_geotiff(path).context("Failed to read label raster")?;
    pb.finish_and_clear();
    Ok(raster)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Search ───────────────────────────────────────────────────
        Commands::Search { query } => {
            query.validate()?;
            let pipeline = Pipeline::remote(query.options()).context("Failed to set up catalog client")?;

            let pb = spinner("Searching catalog...");
            let scene = pipeline.find_scene(&query.search_query());
            pb.finish_and_clear();

            match scene.context("Catalog search failed")? {
                Some(scene) => print_scene(&scene),
                None => println!("No scene found"),
            }
        }

        // ── Cluster ──────────────────────────────────────────────────
        Commands::Cluster {
            query,
            chip_km,
            half_width,
            k,
            seed,
            output,
            areas_json,
        } => {
            query.validate()?;
            let half_width = chip_half_width(chip_km, half_width)?;
            let target = output.map_or(OutputTarget::TempUnique, OutputTarget::Path);
            let request = query.request(half_width, k as usize, seed, target);
            let pipeline = Pipeline::remote(query.options()).context("Failed to set up catalog client")?;

            let start = Instant::now();
            let pb = spinner("Starting...");
            let outcome = pipeline.run_with(&request, |stage| pb.set_message(stage.describe()));
            pb.finish_and_clear();

            let result = match outcome.context("Clustering failed")? {
                ClusterOutcome::Clustered(result) => result,
                ClusterOutcome::NoScene => {
                    println!("No scene found");
                    return Ok(());
                }
            };

            print_scene(&result.scene);
            let w = result.window.window;
            println!(
                "\nWindow: rows {}..{}, cols {}..{} ({} x {} px)",
                w.row_start,
                w.row_stop,
                w.col_start,
                w.col_stop,
                w.cols(),
                w.rows()
            );
            let b = result.bounds;
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                b.min_x, b.min_y, b.max_x, b.max_y
            );
            print_areas(&result.areas);

            if let Some(path) = areas_json {
                let json = serde_json::to_string_pretty(&result.summary())
                    .context("Failed to serialize summary")?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Summary written to {}", path.display());
            }
            done("Clusters", &result.output_path, start.elapsed());
        }

        // ── Inspect ──────────────────────────────────────────────────
        Commands::Inspect { input } => {
            let raster = read_labels(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let t = raster.transform();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: unknown"),
            }
            println!(
                "Transform: origin ({:.3}, {:.3}), pixel {} x {}",
                t.origin_x, t.origin_y, t.pixel_width, t.pixel_height
            );
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );

            let areas = class_areas(&raster, raster.pixel_area())
                .context("Failed to compute class areas")?;
            print_areas(&areas);
        }
    }

    Ok(())
}
