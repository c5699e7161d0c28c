//! Random forest regressor, fitted by smartcore.
//!
//! Rows are predictor vectors in the order of the caller's predictor list.
//! Species arrives as its vocabulary code and is split like any numeric
//! column, so a code never seen in training still lands in a leaf.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Error, Result};

type Regressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

// ── Hyperparameters ──────────────────────────────────────────────────────────

/// Forest hyperparameters. The split criterion is always variance reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Predictors tried per split. `None` = ⌊√p⌋, at least 1.
    pub mtry: Option<usize>,
    /// Minimum rows in each leaf.
    pub min_leaf: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            mtry: None,
            min_leaf: 5,
            max_depth: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn resolved_mtry(&self, n_features: usize) -> usize {
        self.mtry
            .unwrap_or_else(|| ((n_features as f64).sqrt().floor() as usize).max(1))
    }

    fn to_smartcore(&self, n_features: usize) -> Result<RandomForestRegressorParameters> {
        if self.n_trees == 0 {
            return Err(Error::InvalidParams("n_trees must be at least 1".into()));
        }
        if self.min_leaf == 0 {
            return Err(Error::InvalidParams("min_leaf must be at least 1".into()));
        }
        let mtry = self.resolved_mtry(n_features);
        if mtry == 0 || mtry > n_features {
            return Err(Error::InvalidParams(format!(
                "mtry = {mtry} outside 1..={n_features}"
            )));
        }
        let mut params = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_m(mtry)
            .with_min_samples_leaf(self.min_leaf)
            .with_min_samples_split(2 * self.min_leaf)
            .with_seed(self.seed);
        if let Some(depth) = self.max_depth {
            params = params.with_max_depth(u16::try_from(depth).unwrap_or(u16::MAX));
        }
        Ok(params)
    }
}

// ── Forest ───────────────────────────────────────────────────────────────────

pub struct RandomForest {
    model: Regressor,
    n_features: usize,
}

fn check_rows(x: &[Vec<f64>], n_features: usize, what: &str) -> Result<()> {
    if let Some(row) = x.iter().position(|r| r.len() != n_features) {
        return Err(Error::InvalidParams(format!(
            "{what} row {row} has {} predictors, expected {n_features}",
            x[row].len()
        )));
    }
    if x.iter().flatten().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite(format!("{what} predictors")));
    }
    Ok(())
}

impl RandomForest {
    /// Fit on every row of `x` against `y`.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        let n = x.len();
        if n == 0 {
            return Err(Error::EmptyTrainingSet);
        }
        if y.len() != n {
            return Err(Error::InvalidParams(format!("{} targets for {} rows", y.len(), n)));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(Error::InvalidParams("no predictors".into()));
        }
        check_rows(x, n_features, "training")?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFinite("target".into()));
        }
        let sc_params = params.to_smartcore(n_features)?;

        let matrix = DenseMatrix::from_2d_vec(&x.to_vec());
        let model = Regressor::fit(&matrix, &y.to_vec(), sc_params)
            .map_err(|e| Error::Model(e.to_string()))?;
        Ok(Self { model, n_features })
    }

    /// Mean of the tree predictions for each row of `x`.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        check_rows(x, self.n_features, "prediction")?;
        let matrix = DenseMatrix::from_2d_vec(&x.to_vec());
        self.model
            .predict(&matrix)
            .map_err(|e| Error::Model(e.to_string()))
    }
}
