//! Tile grid math: which tiles of an image a pixel window touches.

use s2cluster_core::raster::PixelWindow;

/// A tile that contributes to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    /// Linear tile index in the TIFF tile array (row-major).
    pub tile_idx: usize,
    /// Tile column in the tile grid.
    pub tile_col: usize,
    /// Tile row in the tile grid.
    pub tile_row: usize,
}

/// Tiles intersecting `window`, row-major.
///
/// Returns `None` when the window is empty or not fully inside the
/// `image_width × image_height` image.
pub fn tiles_for_window(
    window: &PixelWindow,
    image_width: usize,
    image_height: usize,
    tile_width: usize,
    tile_height: usize,
) -> Option<Vec<TileRequest>> {
    if !window.fits_within(image_width, image_height) || tile_width == 0 || tile_height == 0 {
        return None;
    }

    let tiles_across = image_width.div_ceil(tile_width);

    let col_range = window.col_start / tile_width..(window.col_stop - 1) / tile_width + 1;
    let row_range = window.row_start / tile_height..(window.row_stop - 1) / tile_height + 1;

    let tiles = row_range
        .flat_map(|tile_row| {
            col_range.clone().map(move |tile_col| TileRequest {
                tile_idx: tile_row * tiles_across + tile_col,
                tile_col,
                tile_row,
            })
        })
        .collect();

    Some(tiles)
}
