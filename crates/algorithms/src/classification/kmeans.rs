//! K-means clustering of multi-band pixel vectors
//!
//! Partitions the rows of a `pixels × bands` matrix into k clusters by
//! squared Euclidean distance. Seeding is k-means++; the best of `n_init`
//! independent runs (lowest inertia) is returned.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::maybe_rayon::*;
use s2cluster_core::{Error, Result};

/// Parameters for K-means clustering
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum Lloyd iterations per run (default: 300)
    pub max_iterations: usize,
    /// Convergence tolerance, relative to the mean per-band variance of the
    /// input. A run stops once the summed squared centroid shift falls to
    /// `tolerance × mean variance` or below (default: 1e-4)
    pub tolerance: f64,
    /// Number of seeded runs; the lowest-inertia run wins (default: 10)
    pub n_init: usize,
    /// Random seed. `None` draws from OS entropy, so repeated runs may
    /// produce different (but equally valid) labelings.
    pub seed: Option<u64>,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 10,
            seed: None,
        }
    }
}

/// Outcome of a K-means fit
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster label `0..k` per input row
    pub labels: Vec<usize>,
    /// `k × bands` centroid matrix
    pub centroids: Array2<f64>,
    /// Sum of squared distances of each row to its centroid
    pub inertia: f64,
    /// Lloyd iterations used by the winning run
    pub iterations: usize,
}

/// Cluster the rows of `data` (`pixels × bands`).
///
/// Every label in `0..k` is assigned to at least one row whenever
/// `data` has at least `k` rows.
///
/// # Errors
/// - `k == 0`, `n_init == 0` or `max_iterations == 0`
/// - fewer rows than clusters
/// - non-finite values in `data`
/// - values so far apart that squared distances overflow `f64`
pub fn kmeans(data: ArrayView2<f64>, params: &KmeansParams) -> Result<KmeansResult> {
    let (n, dims) = data.dim();

    if params.k == 0 {
        return Err(Error::InvalidParameter {
            name: "k",
            value: params.k.to_string(),
            reason: "at least one cluster is required".into(),
        });
    }
    if params.n_init == 0 || params.max_iterations == 0 {
        return Err(Error::InvalidParameter {
            name: "n_init/max_iterations",
            value: format!("{}/{}", params.n_init, params.max_iterations),
            reason: "must be positive".into(),
        });
    }
    if n < params.k {
        return Err(Error::Algorithm(format!(
            "Not enough pixels ({}) for {} clusters",
            n, params.k
        )));
    }
    if dims == 0 || data.iter().any(|v| !v.is_finite()) {
        return Err(Error::Algorithm(
            "K-means input must have at least one band and only finite values".into(),
        ));
    }

    let threshold = params.tolerance * mean_variance(data);
    if !threshold.is_finite() {
        return Err(distance_overflow());
    }
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut best: Option<KmeansResult> = None;
    for _ in 0..params.n_init {
        let run = single_run(data, params.k, params.max_iterations, threshold, &mut rng)?;
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    best.ok_or_else(|| Error::Algorithm("K-means produced no run".into()))
}

/// One k-means++ seeded Lloyd run.
fn single_run(
    data: ArrayView2<f64>,
    k: usize,
    max_iterations: usize,
    threshold: f64,
    rng: &mut StdRng,
) -> Result<KmeansResult> {
    let (n, dims) = data.dim();
    let mut centroids = kmeans_plus_plus(data, k, rng)?;
    let mut assignment = assign(data, &centroids);
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let mut sums = Array2::<f64>::zeros((k, dims));
        let mut counts = vec![0usize; k];
        for (i, &(label, _)) in assignment.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += &data.row(i);
            counts[label] += 1;
        }

        let mut new_centroids = sums;
        for (c, &count) in counts.iter().enumerate() {
            if count > 0 {
                new_centroids.row_mut(c).mapv_inplace(|v| v / count as f64);
            }
        }
        reseed_empty(data, &mut new_centroids, &counts, &mut assignment);

        let shift: f64 = centroids
            .rows()
            .into_iter()
            .zip(new_centroids.rows())
            .map(|(old, new)| squared_distance(old, new))
            .sum();

        centroids = new_centroids;
        assignment = assign(data, &centroids);

        if shift <= threshold {
            break;
        }
    }

    let mut labels: Vec<usize> = assignment.iter().map(|&(l, _)| l).collect();
    cover_all_labels(data, &mut centroids, &mut labels, &assignment);

    let inertia = (0..n)
        .map(|i| squared_distance(data.row(i), centroids.row(labels[i])))
        .sum();

    Ok(KmeansResult {
        labels,
        centroids,
        inertia,
        iterations,
    })
}

/// k-means++ seeding: the first centroid is uniform, each next one is drawn
/// with probability proportional to its squared distance to the nearest
/// centroid chosen so far.
fn kmeans_plus_plus(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Result<Array2<f64>> {
    let (n, dims) = data.dim();
    let mut centroids = Array2::<f64>::zeros((k, dims));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut nearest: Vec<f64> = (0..n)
        .map(|i| squared_distance(data.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = nearest.iter().sum();
        if !total.is_finite() {
            return Err(distance_overflow());
        }
        let pick = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            nearest
                .iter()
                .position(|&d| {
                    target -= d;
                    target < 0.0
                })
                .unwrap_or(n - 1)
        } else {
            // Every row coincides with a centroid already
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&data.row(pick));
        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(squared_distance(data.row(i), centroids.row(c)));
        }
    }

    Ok(centroids)
}

fn distance_overflow() -> Error {
    Error::Algorithm("K-means input spread is too large: squared distances overflow f64".into())
}

/// Nearest centroid and squared distance for every row; ties go to the
/// lowest label.
fn assign(data: ArrayView2<f64>, centroids: &Array2<f64>) -> Vec<(usize, f64)> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut best = (0, f64::INFINITY);
            for (c, centroid) in centroids.rows().into_iter().enumerate() {
                let d = squared_distance(row, centroid);
                if d < best.1 {
                    best = (c, d);
                }
            }
            best
        })
        .collect()
}

/// Move each empty cluster onto the row farthest from its centroid.
fn reseed_empty(
    data: ArrayView2<f64>,
    centroids: &mut Array2<f64>,
    counts: &[usize],
    assignment: &mut [(usize, f64)],
) {
    for (c, _) in counts.iter().enumerate().filter(|(_, &count)| count == 0) {
        if let Some(far) = farthest(assignment, |_| true) {
            centroids.row_mut(c).assign(&data.row(far));
            assignment[far] = (c, 0.0);
        }
    }
}

/// Final pass: hand every still-empty label the farthest row of a cluster
/// that has rows to spare.
fn cover_all_labels(
    data: ArrayView2<f64>,
    centroids: &mut Array2<f64>,
    labels: &mut [usize],
    assignment: &[(usize, f64)],
) {
    let k = centroids.nrows();
    let mut counts = vec![0usize; k];
    for &l in labels.iter() {
        counts[l] += 1;
    }
    let mut distances: Vec<(usize, f64)> = labels
        .iter()
        .zip(assignment)
        .map(|(&l, &(_, d))| (l, d))
        .collect();

    for c in 0..k {
        if counts[c] > 0 {
            continue;
        }
        let Some(far) = farthest(&distances, |l| counts[l] > 1) else {
            break;
        };
        counts[labels[far]] -= 1;
        counts[c] = 1;
        labels[far] = c;
        distances[far] = (c, 0.0);
        centroids.row_mut(c).assign(&data.row(far));
    }
}

fn farthest(assignment: &[(usize, f64)], eligible: impl Fn(usize) -> bool) -> Option<usize> {
    assignment
        .iter()
        .enumerate()
        .filter(|(_, &(label, _))| eligible(label))
        .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map(|(i, _)| i)
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Mean over columns of the population variance of each column.
fn mean_variance(data: ArrayView2<f64>) -> f64 {
    let n = data.nrows() as f64;
    let cols = data.ncols();
    let total: f64 = data
        .columns()
        .into_iter()
        .map(|col| {
            let mean = col.sum() / n;
            col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
        })
        .sum();
    total / cols as f64
}
