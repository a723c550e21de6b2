//! Rectangular pixel regions

use serde::{Deserialize, Serialize};

/// A rectangular pixel region `[row_start, row_stop) × [col_start, col_stop)`
/// of a parent grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub row_start: usize,
    pub row_stop: usize,
    pub col_start: usize,
    pub col_stop: usize,
}

impl PixelWindow {
    /// Window from its top-left offset and size
    pub fn new(row_start: usize, col_start: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_start,
            row_stop: row_start + rows,
            col_start,
            col_stop: col_start + cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.row_stop.saturating_sub(self.row_start)
    }

    pub fn cols(&self) -> usize {
        self.col_stop.saturating_sub(self.col_start)
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn pixel_count(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Whether the window lies entirely inside a `width × height` grid
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        !self.is_empty() && self.row_stop <= height && self.col_stop <= width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_shape() {
        let w = PixelWindow::new(10, 20, 4, 6);
        assert_eq!(w.row_stop, 14);
        assert_eq!(w.col_stop, 26);
        assert_eq!(w.shape(), (4, 6));
        assert_eq!(w.pixel_count(), 24);
        assert!(w.fits_within(26, 14));
        assert!(!w.fits_within(25, 14));
        assert!(!PixelWindow::new(0, 0, 0, 3).fits_within(10, 10));
    }
}
