//! Cross-validation partitioning strategies.
//!
//! Every strategy labels each row with the fold whose test set it belongs to.
//! Fold `i` tests on the rows labelled `i` and trains on all others, so the
//! test sets cover the table exactly once.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::cluster::{kmeans, KMeansParams};
use crate::error::{Error, Result};
use crate::observation::ObservationTable;
use crate::stats::standardize;

/// One (train, test) split. Indices refer to rows of the observation table.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Test-fold label for every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    k: usize,
    labels: Vec<usize>,
}

impl Partition {
    pub fn new(k: usize, labels: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = labels.iter().find(|&&l| l >= k) {
            return Err(Error::InvalidFolds(format!("label {bad} outside 0..{k}")));
        }
        Ok(Self { k, labels })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }

    /// Labels one row per table row and folds cover the table exactly once.
    pub fn validate(&self, n_rows: usize) -> Result<()> {
        if self.labels.len() != n_rows {
            return Err(Error::InvalidFolds(format!(
                "{} labels for {} rows",
                self.labels.len(),
                n_rows
            )));
        }
        check_cover(&self.folds(), n_rows)
    }

    pub fn folds(&self) -> Vec<Fold> {
        (0..self.k)
            .map(|index| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..self.labels.len()).partition(|&r| self.labels[r] == index);
                Fold { index, train, test }
            })
            .collect()
    }
}

/// Check that `folds` have pairwise disjoint test sets covering `0..n_rows`
/// and that each train set is the complement of its test set.
pub fn check_cover(folds: &[Fold], n_rows: usize) -> Result<()> {
    let mut seen = vec![false; n_rows];
    for fold in folds {
        let mut in_test = vec![false; n_rows];
        for &r in &fold.test {
            if r >= n_rows {
                return Err(Error::RowOutOfRange { index: r, len: n_rows });
            }
            if seen[r] {
                return Err(Error::InvalidFolds(format!("row {r} tested twice")));
            }
            seen[r] = true;
            in_test[r] = true;
        }
        for &r in &fold.train {
            if r >= n_rows {
                return Err(Error::RowOutOfRange { index: r, len: n_rows });
            }
            if in_test[r] {
                return Err(Error::OverlappingFold(r));
            }
        }
        if fold.train.len() + fold.test.len() != n_rows {
            return Err(Error::InvalidFolds(format!(
                "fold {}: train and test do not complement each other",
                fold.index
            )));
        }
    }
    if let Some(r) = seen.iter().position(|&s| !s) {
        return Err(Error::InvalidFolds(format!("row {r} is never tested")));
    }
    Ok(())
}

/// A way of cutting the observation table into `k` validation folds.
pub trait PartitionStrategy {
    fn name(&self) -> &'static str;

    fn k(&self) -> usize;

    fn partition(&self, table: &ObservationTable) -> Result<Partition>;
}

// ── Random ───────────────────────────────────────────────────────────────────

/// Rows shuffled with a seeded RNG and dealt round-robin, so fold sizes differ
/// by at most one.
#[derive(Debug, Clone)]
pub struct RandomFolds {
    pub k: usize,
    pub seed: u64,
}

impl PartitionStrategy for RandomFolds {
    fn name(&self) -> &'static str {
        "random"
    }

    fn k(&self) -> usize {
        self.k
    }

    fn partition(&self, table: &ObservationTable) -> Result<Partition> {
        let n = table.len();
        if self.k == 0 {
            return Err(Error::InvalidParams("k must be at least 1".into()));
        }
        if n < self.k {
            return Err(Error::TooFewPoints { k: self.k, n });
        }
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);
        let mut labels = vec![0usize; n];
        for (pos, &row) in order.iter().enumerate() {
            labels[row] = pos % self.k;
        }
        Partition::new(self.k, labels)
    }
}

// ── Spatial ──────────────────────────────────────────────────────────────────

/// k-means on (longitude, latitude) in degrees; each cluster is one test fold.
#[derive(Debug, Clone)]
pub struct SpatialClusters {
    pub k: usize,
    pub seed: u64,
    pub kmeans: KMeansParams,
}

impl PartitionStrategy for SpatialClusters {
    fn name(&self) -> &'static str {
        "spatial"
    }

    fn k(&self) -> usize {
        self.k
    }

    fn partition(&self, table: &ObservationTable) -> Result<Partition> {
        let points: Vec<Vec<f64>> = table
            .rows()
            .iter()
            .map(|o| vec![o.longitude, o.latitude])
            .collect();
        let fit = kmeans(&points, self.k, self.seed, &self.kmeans)?;
        info!(sizes = ?fit.sizes(), "spatial clusters");
        Partition::new(self.k, fit.labels)
    }
}

// ── Environmental ────────────────────────────────────────────────────────────

/// k-means on mean annual temperature and precipitation, each standardized to
/// zero mean and unit sample standard deviation first.
#[derive(Debug, Clone)]
pub struct EnvironmentalClusters {
    pub k: usize,
    pub seed: u64,
    pub kmeans: KMeansParams,
}

impl EnvironmentalClusters {
    /// The standardized (temperature, precipitation) columns fed to k-means.
    pub fn scaled_inputs(table: &ObservationTable) -> (Vec<f64>, Vec<f64>) {
        let temp: Vec<f64> = table.rows().iter().map(|o| o.temperature).collect();
        let precip: Vec<f64> = table.rows().iter().map(|o| o.precipitation).collect();
        (standardize(&temp), standardize(&precip))
    }
}

impl PartitionStrategy for EnvironmentalClusters {
    fn name(&self) -> &'static str {
        "environmental"
    }

    fn k(&self) -> usize {
        self.k
    }

    fn partition(&self, table: &ObservationTable) -> Result<Partition> {
        let (temp, precip) = Self::scaled_inputs(table);
        let points: Vec<Vec<f64>> = temp.into_iter().zip(precip).map(|(t, p)| vec![t, p]).collect();
        let fit = kmeans(&points, self.k, self.seed, &self.kmeans)?;
        info!(sizes = ?fit.sizes(), "environmental clusters");
        Partition::new(self.k, fit.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::tests::obs;
    use crate::observation::Observation;
    use crate::stats::{mean, sample_sd};
    use approx::assert_relative_eq;

    fn table(n: usize) -> ObservationTable {
        let rows: Vec<Observation> = (0..n)
            .map(|i| {
                let mut o = obs((i as f64 * 37.0) % 360.0 - 180.0, (i as f64 * 13.0) % 180.0 - 90.0, 1.0 + i as f64 * 0.01, "sp");
                o.temperature = (i as f64 * 0.7).sin() * 15.0 + 10.0;
                o.precipitation = 400.0 + (i as f64 * 1.3).cos().abs() * 2000.0;
                o
            })
            .collect();
        ObservationTable::new(rows)
    }

    fn strategies() -> Vec<Box<dyn PartitionStrategy>> {
        vec![
            Box::new(RandomFolds { k: 5, seed: 100 }),
            Box::new(SpatialClusters { k: 5, seed: 100, kmeans: KMeansParams::default() }),
            Box::new(EnvironmentalClusters { k: 5, seed: 100, kmeans: KMeansParams::default() }),
        ]
    }

    #[test]
    fn every_strategy_covers_rows_exactly_once() {
        let t = table(200);
        for s in strategies() {
            let p = s.partition(&t).unwrap();
            let folds = p.folds();
            assert_eq!(folds.len(), 5, "{}", s.name());
            check_cover(&folds, t.len()).unwrap();
            assert!(p.sizes().iter().all(|&n| n > 0), "{}: {:?}", s.name(), p.sizes());
        }
    }

    #[test]
    fn random_folds_are_balanced_and_seeded() {
        let t = table(103);
        let a = RandomFolds { k: 5, seed: 100 }.partition(&t).unwrap();
        let b = RandomFolds { k: 5, seed: 100 }.partition(&t).unwrap();
        assert_eq!(a, b);
        let sizes = a.sizes();
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn environmental_inputs_are_standardized() {
        let t = table(150);
        let (temp, precip) = EnvironmentalClusters::scaled_inputs(&t);
        for col in [&temp, &precip] {
            assert_relative_eq!(mean(col), 0.0, epsilon = 1e-9);
            assert_relative_eq!(sample_sd(col), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn check_cover_detects_violations() {
        let overlapping = vec![
            Fold { index: 0, train: vec![1], test: vec![0] },
            Fold { index: 1, train: vec![1], test: vec![1] },
        ];
        assert!(matches!(check_cover(&overlapping, 2), Err(Error::OverlappingFold(1))));

        let uncovered = vec![Fold { index: 0, train: vec![1, 2], test: vec![0] }];
        assert!(check_cover(&uncovered, 3).is_err());

        let twice = vec![
            Fold { index: 0, train: vec![1], test: vec![0] },
            Fold { index: 1, train: vec![1], test: vec![0] },
        ];
        assert!(matches!(check_cover(&twice, 2), Err(Error::InvalidFolds(_))));
    }

    #[test]
    fn label_out_of_range_is_rejected() {
        assert!(Partition::new(2, vec![0, 1, 2]).is_err());
    }

    #[test]
    fn validate_checks_row_count() {
        let p = Partition::new(2, vec![0, 1, 1, 0]).unwrap();
        assert!(p.validate(4).is_ok());
        assert!(matches!(p.validate(5), Err(Error::InvalidFolds(_))));
    }

    #[test]
    fn random_folds_need_k_rows() {
        assert!(matches!(
            RandomFolds { k: 5, seed: 1 }.partition(&table(3)),
            Err(Error::TooFewPoints { .. })
        ));
    }
}
