//! Cross-validation runs: one forest per fold, per strategy.

use serde::Serialize;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::evaluate::{evaluate_fold, FoldMetrics};
use crate::forest::ForestParams;
use crate::observation::{ObservationTable, Predictor};
use crate::partition::{
    EnvironmentalClusters, Fold, Partition, PartitionStrategy, RandomFolds, SpatialClusters,
};
use crate::stats::{mean, sample_sd};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldOutcome {
    /// 0-based fold index; reports show it 1-based.
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: FoldMetrics,
}

/// Per-fold results of one strategy.
#[derive(Debug, Clone)]
pub struct CvRun {
    pub strategy: &'static str,
    pub partition: Partition,
    pub folds: Vec<FoldOutcome>,
}

impl CvRun {
    fn metric(&self, get: impl Fn(&FoldMetrics) -> f64) -> Vec<f64> {
        self.folds.iter().map(|f| get(&f.metrics)).collect()
    }

    fn rsq(&self) -> Vec<f64> {
        self.metric(|m| m.rsq)
    }

    /// Unweighted mean of the per-fold metrics.
    pub fn mean(&self) -> FoldMetrics {
        FoldMetrics {
            rsq: mean(&self.rsq()),
            squared_r: mean(&self.metric(|m| m.squared_r)),
            rmse: mean(&self.metric(|m| m.rmse)),
        }
    }

    /// max − min of the per-fold R².
    pub fn rsq_spread(&self) -> f64 {
        let rsq = self.rsq();
        let max = rsq.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = rsq.iter().cloned().fold(f64::INFINITY, f64::min);
        max - min
    }

    pub fn rsq_sd(&self) -> f64 {
        sample_sd(&self.rsq())
    }
}

/// Partition `table` with `strategy` and evaluate every fold. Outcomes keep
/// fold order; with the `threading` feature folds run on the rayon pool.
/// Any failing fold aborts the run.
pub fn cross_validate(
    table: &ObservationTable,
    strategy: &dyn PartitionStrategy,
    predictors: &[Predictor],
    params: &ForestParams,
) -> Result<CvRun> {
    let partition = strategy.partition(table)?;
    partition.validate(table.len())?;
    let folds = partition.folds();

    let name = strategy.name();
    let run_fold = |fold: &Fold| -> Result<FoldOutcome> {
        info!(
            strategy = name,
            fold = fold.index + 1,
            n_train = fold.train.len(),
            n_test = fold.test.len(),
            "evaluating fold"
        );
        let metrics = evaluate_fold(table, &fold.train, &fold.test, predictors, params)?;
        info!(strategy = name, fold = fold.index + 1, rsq = metrics.rsq, rmse = metrics.rmse, "fold done");
        Ok(FoldOutcome {
            fold: fold.index,
            n_train: fold.train.len(),
            n_test: fold.test.len(),
            metrics,
        })
    };

    #[cfg(feature = "threading")]
    let outcomes: Result<Vec<FoldOutcome>> = {
        use rayon::prelude::*;
        folds.par_iter().map(run_fold).collect()
    };
    #[cfg(not(feature = "threading"))]
    let outcomes: Result<Vec<FoldOutcome>> = folds.iter().map(run_fold).collect();

    Ok(CvRun { strategy: name, partition, folds: outcomes? })
}

/// One row of the strategy comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategySummary {
    pub strategy: &'static str,
    pub mean: FoldMetrics,
    pub rsq_sd: f64,
    pub rsq_spread: f64,
}

/// Summaries of `runs` in the order given. Descriptive only.
pub fn compare(runs: &[CvRun]) -> Vec<StrategySummary> {
    runs.iter()
        .map(|r| StrategySummary {
            strategy: r.strategy,
            mean: r.mean(),
            rsq_sd: r.rsq_sd(),
            rsq_spread: r.rsq_spread(),
        })
        .collect()
}

/// Random, spatial and environmental strategies as configured.
pub fn standard_strategies(cfg: &AnalysisConfig) -> Vec<Box<dyn PartitionStrategy>> {
    vec![
        Box::new(RandomFolds { k: cfg.folds, seed: cfg.partition_seed }),
        Box::new(SpatialClusters {
            k: cfg.folds,
            seed: cfg.partition_seed,
            kmeans: cfg.kmeans.clone(),
        }),
        Box::new(EnvironmentalClusters {
            k: cfg.folds,
            seed: cfg.partition_seed,
            kmeans: cfg.kmeans.clone(),
        }),
    ]
}
