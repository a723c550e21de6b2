//! Integration tests for the COG reader.
//!
//! Tests marked `#[ignore]` require network access to the public Sentinel-2
//! COG bucket. Run with: `cargo test -p s2cluster-cloud -- --ignored`

use s2cluster_cloud::cog_reader::{assemble_window, decode_tile, CogReader, CogReaderOptions};
use s2cluster_cloud::decompress::{compression, predictor, sample_format};
use s2cluster_cloud::ifd::{IfdInfo, TiffByteOrder};
use s2cluster_cloud::tile_index::tiles_for_window;
use s2cluster_core::raster::PixelWindow;

/// Red band of a Sentinel-2 L2A tile over Madrid (UTM 30N, 10 m).
const B04_URL: &str = "https://sentinel-cogs.s3.us-west-2.amazonaws.com/sentinel-s2-l2a-cogs/30/T/VK/2020/7/S2B_30TVK_20200712_0_L2A/B04.tif";

#[tokio::test]
#[ignore]
async fn test_read_sentinel2_metadata() {
    let reader = CogReader::open(B04_URL, CogReaderOptions::default())
        .await
        .expect("failed to open COG");

    assert_eq!(reader.size(), (10980, 10980));
    assert_eq!(reader.crs().map(|c| c.epsg()), Some(32630));

    let gt = reader.geo_transform().expect("COG should be georeferenced");
    assert_eq!(gt.pixel_width, 10.0);
    assert_eq!(gt.pixel_height, -10.0);
}

#[tokio::test]
#[ignore]
async fn test_read_sentinel2_window() {
    let mut reader = CogReader::open(B04_URL, CogReaderOptions::default())
        .await
        .expect("failed to open COG");
    let gt = reader.geo_transform().expect("georeferenced");

    let window = PixelWindow::new(5000, 5000, 64, 64);
    let raster: s2cluster_core::Raster<u16> =
        reader.read_window(&window).await.expect("failed to read window");

    assert_eq!(raster.shape(), (64, 64));
    assert_eq!(*raster.transform(), gt.for_window(&window));
    assert!(raster.data().iter().any(|&v| v > 0));

    // Second read of the same window is served from the cache.
    let cached = reader.cached_tiles();
    assert!(cached > 0);
    let _again: s2cluster_core::Raster<u16> = reader.read_window(&window).await.unwrap();
    assert_eq!(reader.cached_tiles(), cached);
}

#[tokio::test]
#[ignore]
async fn test_window_outside_is_rejected() {
    let mut reader = CogReader::open(B04_URL, CogReaderOptions::default())
        .await
        .expect("failed to open COG");
    let err = reader
        .read_window::<u16>(&PixelWindow::new(10_950, 0, 64, 64))
        .await
        .unwrap_err();
    assert!(matches!(err, s2cluster_cloud::CloudError::WindowOutside { .. }));
}

fn u16_tiled(compression: u16, predictor: u16) -> IfdInfo {
    IfdInfo {
        width: 6,
        height: 4,
        tile_width: 4,
        tile_height: 4,
        tile_offsets: vec![0, 0],
        tile_byte_counts: vec![1, 1],
        bits_per_sample: 16,
        sample_format: sample_format::UNSIGNED_INT,
        compression,
        samples_per_pixel: 1,
        planar_config: 1,
        predictor,
        byte_order: TiffByteOrder::LittleEndian,
    }
}

/// Horizontal-difference and deflate a tile the way GDAL writes them.
#[cfg(feature = "deflate")]
fn encode_tile(values: &[u16], tile_width: usize) -> Vec<u8> {
    use std::io::Write;

    let mut diffed = Vec::with_capacity(values.len() * 2);
    for row in values.chunks(tile_width) {
        let mut prev = 0u16;
        for &v in row {
            diffed.extend_from_slice(&v.wrapping_sub(prev).to_le_bytes());
            prev = v;
        }
    }
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    enc.write_all(&diffed).unwrap();
    enc.finish().unwrap()
}

#[cfg(feature = "deflate")]
#[test]
fn test_deflate_predictor_tiles_assemble() {
    let ifd = u16_tiled(compression::DEFLATE, predictor::HORIZONTAL);

    // Image value = 1000 + row * 100 + col, split into two 4x4 tiles;
    // the right tile is padded past column 6.
    let tile = |tile_col: usize| -> Vec<u16> {
        (0..4)
            .flat_map(|r| (0..4).map(move |c| (1000 + r * 100 + tile_col * 4 + c) as u16))
            .collect()
    };
    let encoded = [encode_tile(&tile(0), 4), encode_tile(&tile(1), 4)];

    let window = PixelWindow::new(1, 2, 3, 4);
    let tiles = tiles_for_window(&window, 6, 4, 4, 4).unwrap();
    assert_eq!(tiles.len(), 2);

    let decoded: Vec<Vec<u8>> = tiles
        .iter()
        .map(|tr| decode_tile(&ifd, &encoded[tr.tile_col]).unwrap())
        .collect();
    let parts: Vec<_> = tiles
        .iter()
        .zip(&decoded)
        .map(|(tr, b)| (*tr, Some(b.as_slice())))
        .collect();

    let out = assemble_window::<u16>(&ifd, &window, &parts, 0).unwrap();
    assert_eq!(out.dim(), (3, 4));
    for r in 0..3 {
        for c in 0..4 {
            assert_eq!(out[(r, c)] as usize, 1000 + (r + 1) * 100 + c + 2);
        }
    }
}

#[test]
fn test_decode_rejects_unknown_compression() {
    let ifd = u16_tiled(34887, predictor::NONE);
    assert!(decode_tile(&ifd, &[0, 1, 2]).is_err());
}
