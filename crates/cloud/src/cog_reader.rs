//! Windowed COG reader: open a remote GeoTIFF, read a pixel window.

use std::time::Duration;

use ndarray::Array2;
use s2cluster_core::crs::CRS;
use s2cluster_core::raster::{GeoTransform, PixelWindow, Raster, RasterElement};

use crate::cache::TileCache;
use crate::decompress;
use crate::error::{CloudError, Result};
use crate::geotiff_keys::GeoTiffMeta;
use crate::http::HttpClient;
use crate::ifd::{self, tags, IfdInfo, TagSet};
use crate::tile_index::{self, TileRequest};

/// Bytes fetched up front; enough for the header, first IFD and its tags
/// in every GDAL-written COG.
const INITIAL_FETCH: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for configuring a [`CogReader`].
#[derive(Debug, Clone)]
pub struct CogReaderOptions {
    /// Maximum number of concurrent HTTP fetches (default: 8).
    pub max_concurrent_fetches: usize,
    /// Number of decoded tiles kept in the LRU cache (default: 128).
    pub cache_capacity: usize,
    /// Timeout per HTTP request (default: 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default: 3).
    pub max_retries: u32,
}

impl Default for CogReaderOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            cache_capacity: 128,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Cloud Optimized GeoTIFF reader over HTTP Range requests.
///
/// Only the full-resolution image (first IFD) is read. Decoded tiles are
/// kept in an LRU cache so overlapping windows are not fetched twice.
pub struct CogReader {
    url: String,
    client: HttpClient,
    ifd: IfdInfo,
    geo_meta: GeoTiffMeta,
    cache: TileCache,
    options: CogReaderOptions,
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl CogReader {
    /// Open a remote COG by URL.
    ///
    /// Issues a HEAD request, fetches the first 64 KiB and parses the first
    /// IFD. Tag values outside that prefix are fetched individually.
    pub async fn open(url: &str, options: CogReaderOptions) -> Result<Self> {
        let client = HttpClient::new(options.request_timeout, options.max_retries)?;

        let head = client.head(url).await?;
        let fetch_size = head
            .content_length
            .map_or(INITIAL_FETCH, |size| size.min(INITIAL_FETCH));
        let prefix = client.fetch_range(url, 0, fetch_size).await?;

        let header = ifd::parse_header(&prefix)?;
        if header.first_ifd_offset == 0 {
            return Err(CloudError::NoIfd);
        }
        let ifd_offset = header.first_ifd_offset as u64;

        let count_bytes = read_at(&client, url, &prefix, ifd_offset, 2).await?;
        let entry_count = ifd::read_u16(header.byte_order, &count_bytes) as usize;
        let ifd_bytes =
            read_at(&client, url, &prefix, ifd_offset, ifd::ifd_size(entry_count) as u64).await?;
        let raw = ifd::parse_ifd(header.byte_order, &ifd_bytes)?;

        let mut set = TagSet::new(header.byte_order, raw.entries);
        let wanted: Vec<u16> = tags::STRUCTURE.iter().chain(tags::GEO).copied().collect();
        for (tag, offset, len) in set.pending(&wanted) {
            let bytes = read_at(&client, url, &prefix, offset, len).await?;
            set.attach(tag, bytes);
        }

        let ifd = IfdInfo::from_tags(&set)?;
        if ifd.planar_config != 1 {
            return Err(CloudError::UnsupportedPlanarConfig(ifd.planar_config));
        }
        let geo_meta = GeoTiffMeta::from_tags(&set);

        tracing::debug!(
            url,
            width = ifd.width,
            height = ifd.height,
            tile_width = ifd.tile_width,
            tile_height = ifd.tile_height,
            compression = ifd.compression,
            "opened COG"
        );

        Ok(Self {
            url: url.to_string(),
            client,
            cache: TileCache::new(options.cache_capacity),
            ifd,
            geo_meta,
            options,
        })
    }

    /// Read a pixel window into a `Raster<T>`.
    ///
    /// The returned raster carries the image transform translated to the
    /// window's top-left corner, the image CRS and its nodata value.
    pub async fn read_window<T: RasterElement>(&mut self, window: &PixelWindow) -> Result<Raster<T>> {
        let (width, height) = (self.ifd.width as usize, self.ifd.height as usize);
        let tiles = tile_index::tiles_for_window(
            window,
            width,
            height,
            self.ifd.tile_width as usize,
            self.ifd.tile_height as usize,
        )
        .ok_or(CloudError::WindowOutside {
            row_start: window.row_start,
            row_stop: window.row_stop,
            col_start: window.col_start,
            col_stop: window.col_stop,
            width,
            height,
        })?;

        // Cached tiles first, then the misses.
        let mut blocks: Vec<Option<Vec<u8>>> = Vec::with_capacity(tiles.len());
        let mut to_fetch: Vec<(usize, u64, u64)> = Vec::new(); // (slot, offset, length)
        for (slot, tr) in tiles.iter().enumerate() {
            if let Some(data) = self.cache.get(tr.tile_idx) {
                blocks.push(Some(data.clone()));
                continue;
            }
            blocks.push(None);
            let max = self.ifd.tile_offsets.len();
            let offset = *self
                .ifd
                .tile_offsets
                .get(tr.tile_idx)
                .ok_or(CloudError::TileOutOfRange { tile_idx: tr.tile_idx, max })?;
            let length = self.ifd.tile_byte_counts.get(tr.tile_idx).copied().unwrap_or(0);
            // Sparse tiles have no bytes and read as nodata.
            if length > 0 {
                to_fetch.push((slot, offset, length));
            }
        }

        tracing::debug!(
            tiles = tiles.len(),
            fetch = to_fetch.len(),
            "reading window {}x{}",
            window.rows(),
            window.cols()
        );

        let batch_size = self.options.max_concurrent_fetches.max(1);
        for chunk in to_fetch.chunks(batch_size) {
            let ranges: Vec<(u64, u64)> = chunk.iter().map(|&(_, o, l)| (o, l)).collect();
            let fetched = self.client.fetch_ranges(&self.url, &ranges).await?;

            for (&(slot, _, _), compressed) in chunk.iter().zip(fetched) {
                let decoded = decode_tile(&self.ifd, &compressed)?;
                self.cache.insert(tiles[slot].tile_idx, decoded.clone());
                blocks[slot] = Some(decoded);
            }
        }

        let fill = self
            .geo_meta
            .nodata
            .and_then(num_traits::cast)
            .unwrap_or_else(T::default_nodata);
        let parts: Vec<(TileRequest, Option<&[u8]>)> = tiles
            .iter()
            .zip(&blocks)
            .map(|(tr, b)| (*tr, b.as_deref()))
            .collect();
        let data = assemble_window(&self.ifd, window, &parts, fill)?;

        Ok(self.window_raster(data, window))
    }

    /// Image size as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.ifd.width as usize, self.ifd.height as usize)
    }

    pub fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_meta.geo_transform
    }

    pub fn crs(&self) -> Option<CRS> {
        self.geo_meta.crs
    }

    /// Number of decoded tiles currently cached.
    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    fn window_raster<T: RasterElement>(&self, data: Array2<T>, window: &PixelWindow) -> Raster<T> {
        let mut raster = Raster::from_array(data).with_crs(self.geo_meta.crs);
        if let Some(gt) = self.geo_meta.geo_transform {
            raster.set_transform(gt.for_window(window));
        }
        if let Some(nd) = self.geo_meta.nodata {
            raster.set_nodata(num_traits::cast(nd));
        }
        raster
    }
}

// ---------------------------------------------------------------------------
// Tile decoding and assembly
// ---------------------------------------------------------------------------

/// Decompress one tile and reverse its predictor.
pub fn decode_tile(ifd: &IfdInfo, compressed: &[u8]) -> Result<Vec<u8>> {
    let mut raw = decompress::decompress_tile(compressed, ifd.compression, ifd.tile_raw_size())?;
    let spp = ifd.samples_per_pixel as usize;
    decompress::undo_predictor(
        &mut raw,
        ifd.predictor,
        ifd.bytes_per_sample(),
        ifd.tile_width as usize * spp,
        spp,
        ifd.byte_order,
    )?;
    Ok(raw)
}

/// Copy the window's pixels out of decoded tiles.
///
/// Pixels covered by a missing tile (`None`) or past the end of a short
/// final strip keep `fill`.
pub fn assemble_window<T: RasterElement>(
    ifd: &IfdInfo,
    window: &PixelWindow,
    tiles: &[(TileRequest, Option<&[u8]>)],
    fill: T,
) -> Result<Array2<T>> {
    let tw = ifd.tile_width as usize;
    let th = ifd.tile_height as usize;
    let mut output = Array2::<T>::from_elem(window.shape(), fill);

    for (tr, raw) in tiles {
        let Some(raw) = raw else { continue };
        let typed: Vec<T> = decompress::bytes_to_typed(
            raw,
            ifd.bits_per_sample,
            ifd.sample_format,
            ifd.samples_per_pixel as usize,
            ifd.byte_order,
        )?;

        let tile_x = tr.tile_col * tw;
        let tile_y = tr.tile_row * th;
        let rows = window.row_start.max(tile_y)..window.row_stop.min(tile_y + th);
        let cols = window.col_start.max(tile_x)..window.col_stop.min(tile_x + tw);

        for img_row in rows {
            for img_col in cols.clone() {
                let local = (img_row - tile_y) * tw + (img_col - tile_x);
                if let Some(&v) = typed.get(local) {
                    output[(img_row - window.row_start, img_col - window.col_start)] = v;
                }
            }
        }
    }

    Ok(output)
}

/// Bytes `[offset, offset + len)` from the prefetched prefix, or a new
/// Range request when they fall outside it.
async fn read_at(
    client: &HttpClient,
    url: &str,
    prefix: &[u8],
    offset: u64,
    len: u64,
) -> Result<Vec<u8>> {
    let start = offset as usize;
    let end = start + len as usize;
    match prefix.get(start..end) {
        Some(bytes) => Ok(bytes.to_vec()),
        None => client.fetch_range(url, offset, len).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::{compression, predictor, sample_format};
    use crate::ifd::TiffByteOrder;
    use s2cluster_core::io::write_geotiff;

    fn tiled_u8(width: u32, height: u32, tile: u32) -> IfdInfo {
        let n = (width.div_ceil(tile) * height.div_ceil(tile)) as usize;
        IfdInfo {
            width,
            height,
            tile_width: tile,
            tile_height: tile,
            tile_offsets: vec![0; n],
            tile_byte_counts: vec![1; n],
            bits_per_sample: 8,
            sample_format: sample_format::UNSIGNED_INT,
            compression: compression::NONE,
            samples_per_pixel: 1,
            planar_config: 1,
            predictor: predictor::NONE,
            byte_order: TiffByteOrder::LittleEndian,
        }
    }

    /// Tile bytes for an image whose pixel value is `row * 10 + col`.
    fn tile_bytes(ifd: &IfdInfo, tr: &TileRequest) -> Vec<u8> {
        let t = ifd.tile_width as usize;
        let mut out = Vec::with_capacity(t * t);
        for r in 0..t {
            for c in 0..t {
                out.push(((tr.tile_row * t + r) * 10 + tr.tile_col * t + c) as u8);
            }
        }
        out
    }

    #[test]
    fn test_assemble_across_tiles() {
        let ifd = tiled_u8(8, 8, 4);
        let window = PixelWindow::new(2, 3, 4, 3);
        let tiles = tile_index::tiles_for_window(&window, 8, 8, 4, 4).unwrap();
        assert_eq!(tiles.len(), 4);

        let bytes: Vec<Vec<u8>> = tiles.iter().map(|tr| tile_bytes(&ifd, tr)).collect();
        let parts: Vec<(TileRequest, Option<&[u8]>)> = tiles
            .iter()
            .zip(&bytes)
            .map(|(tr, b)| (*tr, Some(b.as_slice())))
            .collect();

        let out: Array2<u8> = assemble_window(&ifd, &window, &parts, 0).unwrap();
        assert_eq!(out.dim(), (4, 3));
        for r in 0..4 {
            for c in 0..3 {
                assert_eq!(out[(r, c)] as usize, (r + 2) * 10 + c + 3);
            }
        }
    }

    #[test]
    fn test_missing_tile_keeps_fill() {
        let ifd = tiled_u8(8, 8, 4);
        let window = PixelWindow::new(0, 2, 2, 4);
        let tiles = tile_index::tiles_for_window(&window, 8, 8, 4, 4).unwrap();
        let first = tile_bytes(&ifd, &tiles[0]);
        let parts = vec![(tiles[0], Some(first.as_slice())), (tiles[1], None)];

        let out: Array2<u8> = assemble_window(&ifd, &window, &parts, 255).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![2, 3, 255, 255]);
        assert_eq!(out.row(1).to_vec(), vec![12, 13, 255, 255]);
    }

    #[test]
    fn test_decode_tile_with_predictor() {
        let mut ifd = tiled_u8(2, 2, 2);
        ifd.predictor = predictor::HORIZONTAL;
        let decoded = decode_tile(&ifd, &[10, 5, 20, 1]).unwrap();
        assert_eq!(decoded, vec![10, 15, 20, 21]);
    }

    /// Parse a whole in-memory GeoTIFF the way `open` parses a remote one.
    fn parse_file(file: &[u8]) -> (IfdInfo, GeoTiffMeta) {
        let header = ifd::parse_header(file).unwrap();
        let raw = ifd::parse_ifd(header.byte_order, &file[header.first_ifd_offset as usize..]).unwrap();
        let set = TagSet::from_file_bytes(header.byte_order, raw.entries, file).unwrap();
        (IfdInfo::from_tags(&set).unwrap(), GeoTiffMeta::from_tags(&set))
    }

    #[test]
    fn test_window_from_written_geotiff() {
        let (rows, cols) = (40, 30);
        let data: Vec<u16> = (0..rows * cols).map(|i| (i * 7 % 5000) as u16).collect();
        let gt = GeoTransform::new(600_000.0, 4_500_000.0, 10.0, -10.0);
        let src = Raster::from_vec(data, rows, cols)
            .unwrap()
            .with_transform(gt)
            .with_crs(Some(CRS::from_epsg(32630)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        write_geotiff(&src, &path).unwrap();
        let file = std::fs::read(&path).unwrap();

        let (info, meta) = parse_file(&file);
        assert_eq!((info.width, info.height), (cols as u32, rows as u32));
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(meta.geo_transform, Some(gt));
        assert_eq!(meta.crs.map(|c| c.epsg()), Some(32630));

        let window = PixelWindow::new(5, 7, 20, 12);
        let tiles = tile_index::tiles_for_window(
            &window,
            cols,
            rows,
            info.tile_width as usize,
            info.tile_height as usize,
        )
        .unwrap();
        let decoded: Vec<Vec<u8>> = tiles
            .iter()
            .map(|tr| {
                let off = info.tile_offsets[tr.tile_idx] as usize;
                let len = info.tile_byte_counts[tr.tile_idx] as usize;
                decode_tile(&info, &file[off..off + len]).unwrap()
            })
            .collect();
        let parts: Vec<(TileRequest, Option<&[u8]>)> = tiles
            .iter()
            .zip(&decoded)
            .map(|(tr, b)| (*tr, Some(b.as_slice())))
            .collect();

        let out: Array2<u16> = assemble_window(&info, &window, &parts, 0).unwrap();
        for r in 0..window.rows() {
            for c in 0..window.cols() {
                let expected = src.get(r + window.row_start, c + window.col_start).unwrap();
                assert_eq!(out[(r, c)], expected);
            }
        }

        let win_gt = gt.for_window(&window);
        assert_eq!(win_gt.origin_x, 600_070.0);
        assert_eq!(win_gt.origin_y, 4_499_950.0);
    }
}
