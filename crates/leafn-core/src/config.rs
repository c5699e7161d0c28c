use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::KMeansParams;
use crate::dataset::ColumnMap;
use crate::error::Result;
use crate::forest::ForestParams;
use crate::observation::Predictor;

/// Analysis parameters. Every field has a default, so a JSON file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub columns: ColumnMap,
    /// Number of most frequent species kept.
    pub top_species: usize,
    /// Folds per strategy; also the k of both k-means variants.
    pub folds: usize,
    /// Seed for random fold assignment and k-means.
    pub partition_seed: u64,
    pub kmeans: KMeansParams,
    /// Forest hyperparameters; `forest.seed` is the model-fitting seed.
    pub forest: ForestParams,
    pub predictors: Vec<Predictor>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            top_species: 50,
            folds: 5,
            partition_seed: 100,
            kmeans: KMeansParams::default(),
            forest: ForestParams::default(),
            predictors: Predictor::ALL.to_vec(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_study_design() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.top_species, 50);
        assert_eq!(cfg.folds, 5);
        assert_eq!(cfg.partition_seed, 100);
        assert_eq!(cfg.forest.seed, 42);
        assert_eq!(cfg.predictors.len(), 8);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = AnalysisConfig::from_json(
            r#"{ "forest": { "n_trees": 100 }, "columns": { "leaf_n": "LeafN" },
                 "predictors": ["latitude", "temperature", "species"] }"#,
        )
        .unwrap();
        assert_eq!(cfg.forest.n_trees, 100);
        assert_eq!(cfg.forest.min_leaf, 5);
        assert_eq!(cfg.columns.leaf_n, "LeafN");
        assert_eq!(cfg.columns.species, "species");
        assert_eq!(
            cfg.predictors,
            vec![Predictor::Latitude, Predictor::Temperature, Predictor::Species]
        );
        assert_eq!(cfg.folds, 5);
    }

    #[test]
    fn unknown_predictor_is_rejected() {
        assert!(AnalysisConfig::from_json(r#"{ "predictors": ["soil_ph"] }"#).is_err());
    }
}
