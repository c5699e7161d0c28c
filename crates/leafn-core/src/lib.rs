//! Leaf nitrogen cross-validation study.
//!
//! Loads leaf nitrogen observations with geographic and climatic predictors,
//! fits random-forest regressors and compares three ways of cutting the data
//! into validation folds: random, spatial (k-means on coordinates) and
//! environmental (k-means on standardized climate).
//!
//! Pipeline:
//!   dataset (read + screen) → partition (random / spatial / environmental) →
//!   evaluate (one forest per fold) → cv (per-fold table + mean) → summary.

pub mod cluster;
pub mod config;
pub mod cv;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod forest;
pub mod observation;
pub mod partition;
pub mod stats;
pub mod summary;

pub use config::AnalysisConfig;
pub use cv::{compare, cross_validate, CvRun, FoldOutcome, StrategySummary};
pub use error::{Error, Result};
pub use evaluate::{evaluate_fold, FoldMetrics};
pub use observation::{Observation, ObservationTable, Predictor};
pub use partition::{
    EnvironmentalClusters, Fold, Partition, PartitionStrategy, RandomFolds, SpatialClusters,
};
