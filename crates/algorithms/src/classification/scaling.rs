//! Per-band min-max normalization of a pixel matrix

use ndarray::{Array2, Axis};

/// Observed value range of one band before scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

/// Rescale every column of a `pixels × bands` matrix to `[0, 1]` in place.
///
/// Each value becomes `(v - min) / (max - min)` with `min`/`max` taken over
/// its column. A constant column has no spread and maps to 0.0.
/// Returns the original range of each column.
pub fn min_max_scale(matrix: &mut Array2<f64>) -> Vec<BandRange> {
    matrix
        .axis_iter_mut(Axis(1))
        .map(|mut col| {
            let (min, max) = col
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let span = max - min;
            if span > 0.0 {
                col.mapv_inplace(|v| (v - min) / span);
            } else {
                col.fill(0.0);
            }
            BandRange { min, max }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_columns_scaled_independently() {
        let mut m = array![[0.0, 1000.0], [5.0, 3000.0], [10.0, 2000.0]];
        let ranges = min_max_scale(&mut m);

        assert_eq!(ranges[0], BandRange { min: 0.0, max: 10.0 });
        assert_eq!(ranges[1], BandRange { min: 1000.0, max: 3000.0 });
        assert_relative_eq!(m[(1, 0)], 0.5);
        assert_relative_eq!(m[(0, 1)], 0.0);
        assert_relative_eq!(m[(1, 1)], 1.0);
        assert_relative_eq!(m[(2, 1)], 0.5);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let mut m = array![[7.0, 1.0], [7.0, 2.0]];
        min_max_scale(&mut m);
        assert_eq!(m.column(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(m.column(1).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let mut m = Array2::from_shape_fn((50, 4), |(r, c)| ((r * 31 + c * 17) % 97) as f64 * 3.5);
        min_max_scale(&mut m);
        assert!(m.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
