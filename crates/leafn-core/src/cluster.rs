//! k-means clustering through aprender.
//!
//! Used to carve observations into spatial or environmental blocks. Each of
//! the `n_init` restarts gets its own random state derived from the seed; the
//! restart with the lowest inertia whose clusters are all populated wins, so a
//! fit is a pure function of (points, k, seed, params).

use aprender::cluster::KMeans;
use aprender::primitives::Matrix;
use aprender::UnsupervisedEstimator;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansParams {
    pub max_iter: usize,
    pub n_init: usize,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { max_iter: 100, n_init: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster id in `0..k` for every input point.
    pub labels: Vec<usize>,
    pub k: usize,
    /// Sum of squared distances of points to their centroid.
    pub inertia: f64,
}

impl KMeansFit {
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

/// Random state of restart `run`; restart 0 uses `seed` itself.
fn restart_seed(seed: u64, run: usize) -> u64 {
    seed.wrapping_add((run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Cluster `points` (all of equal dimension) into `k` groups.
pub fn kmeans(points: &[Vec<f64>], k: usize, seed: u64, params: &KMeansParams) -> Result<KMeansFit> {
    let n = points.len();
    if k == 0 {
        return Err(Error::InvalidParams("k must be at least 1".into()));
    }
    if n < k {
        return Err(Error::TooFewPoints { k, n });
    }
    let dim = points[0].len();
    if points.iter().any(|p| p.len() != dim) {
        return Err(Error::InvalidParams("points differ in dimension".into()));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite("clustering input".into()));
    }

    let flat: Vec<f32> = points.iter().flatten().map(|&v| v as f32).collect();
    let data = Matrix::from_vec(n, dim, flat).map_err(|e| Error::Model(e.to_string()))?;

    let mut best: Option<KMeansFit> = None;
    for run in 0..params.n_init.max(1) {
        let mut model = KMeans::new(k)
            .with_max_iter(params.max_iter.max(1))
            .with_random_state(restart_seed(seed, run));
        model.fit(&data).map_err(|e| Error::Model(e.to_string()))?;
        let fit = KMeansFit {
            labels: model.predict(&data),
            k,
            inertia: f64::from(model.inertia()),
        };
        let populated = fit.sizes().iter().all(|&s| s > 0);
        debug!(run, inertia = fit.inertia, populated, "k-means restart");
        if populated && best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best.ok_or_else(|| Error::Model(format!("every k-means restart left one of {k} clusters empty")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let centers = [(-120.0, 40.0), (10.0, 50.0), (140.0, -30.0), (-60.0, -10.0), (30.0, 0.0)];
        centers
            .iter()
            .flat_map(|&(x, y)| {
                (0..6).map(move |i| vec![x + (i % 3) as f64 * 0.5, y + (i / 3) as f64 * 0.5])
            })
            .collect()
    }

    #[test]
    fn recovers_separated_blobs() {
        let fit = kmeans(&blobs(), 5, 100, &KMeansParams::default()).unwrap();
        assert_eq!(fit.sizes(), vec![6; 5]);
        for blob in 0..5 {
            let first = fit.labels[blob * 6];
            assert!(fit.labels[blob * 6..blob * 6 + 6].iter().all(|&l| l == first));
        }
    }

    #[test]
    fn same_seed_same_labels() {
        let pts: Vec<Vec<f64>> = (0..60).map(|i| vec![(i as f64 * 0.91).sin() * 10.0, (i as f64 * 0.47).cos()]).collect();
        let a = kmeans(&pts, 5, 100, &KMeansParams::default()).unwrap();
        let b = kmeans(&pts, 5, 100, &KMeansParams::default()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert!(a.labels.iter().all(|&l| l < 5));
        assert!(a.inertia >= 0.0);
    }

    #[test]
    fn restart_zero_uses_the_seed() {
        assert_eq!(restart_seed(100, 0), 100);
        assert_ne!(restart_seed(100, 1), restart_seed(100, 2));
    }

    #[test]
    fn invalid_input_is_an_error() {
        let pts = vec![vec![0.0, 0.0]; 3];
        assert!(matches!(
            kmeans(&pts, 5, 100, &KMeansParams::default()),
            Err(Error::TooFewPoints { k: 5, n: 3 })
        ));
        let pts = vec![vec![0.0, f64::NAN], vec![1.0, 1.0]];
        assert!(matches!(kmeans(&pts, 1, 100, &KMeansParams::default()), Err(Error::NonFinite(_))));
        assert!(matches!(kmeans(&pts, 0, 100, &KMeansParams::default()), Err(Error::InvalidParams(_))));
    }
}
