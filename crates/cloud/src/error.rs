//! Error types for the remote catalog and COG reader.

use thiserror::Error;

/// Errors produced by the cloud layer.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server does not support Range requests for {url}")]
    RangeNotSupported { url: String },

    #[error("invalid TIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(u16),

    #[error("unsupported data type: bits_per_sample={bps}, sample_format={sf}")]
    UnsupportedDataType { bps: u16, sf: u16 },

    #[error("unsupported planar configuration: {0} (only chunky=1 supported)")]
    UnsupportedPlanarConfig(u16),

    #[error("unsupported predictor: {0}")]
    UnsupportedPredictor(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("tile {tile_idx} out of range (max {max})")]
    TileOutOfRange { tile_idx: usize, max: usize },

    #[error("no IFD entries found in TIFF")]
    NoIfd,

    #[error("window rows {row_start}..{row_stop}, cols {col_start}..{col_stop} outside {width}x{height} image")]
    WindowOutside {
        row_start: usize,
        row_stop: usize,
        col_start: usize,
        col_stop: usize,
        width: usize,
        height: usize,
    },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("core error: {0}")]
    Core(#[from] s2cluster_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
