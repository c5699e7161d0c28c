//! Fold evaluator: fit on the training rows, score on the held-out rows.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::forest::{ForestParams, RandomForest};
use crate::observation::{ObservationTable, Predictor};
use crate::stats::{pearson_r, r_squared, rmse};

/// Held-out performance of one fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldMetrics {
    /// Coefficient of determination; negative when worse than the test mean.
    pub rsq: f64,
    /// Squared Pearson correlation of predicted and observed values.
    pub squared_r: f64,
    pub rmse: f64,
}

fn check_indices(train: &[usize], test: &[usize], len: usize) -> Result<()> {
    if train.is_empty() {
        return Err(Error::EmptyTrainingSet);
    }
    if test.is_empty() {
        return Err(Error::EmptyTestSet);
    }
    if let Some(&index) = train.iter().chain(test).find(|&&i| i >= len) {
        return Err(Error::RowOutOfRange { index, len });
    }
    let train_set: HashSet<usize> = train.iter().copied().collect();
    if let Some(&r) = test.iter().find(|&&r| train_set.contains(&r)) {
        return Err(Error::OverlappingFold(r));
    }
    Ok(())
}

/// Fit a forest on `train` rows and return R² and RMSE on `test` rows.
///
/// The model is dropped before returning. Species present in `test` but
/// absent from `train` are predicted from their vocabulary code like any other
/// value and are logged.
pub fn evaluate_fold(
    table: &ObservationTable,
    train: &[usize],
    test: &[usize],
    predictors: &[Predictor],
    params: &ForestParams,
) -> Result<FoldMetrics> {
    check_indices(train, test, table.len())?;

    if predictors.contains(&Predictor::Species) {
        let seen: HashSet<&str> = train.iter().map(|&i| table.rows()[i].species.as_str()).collect();
        let unseen: HashSet<&str> = test
            .iter()
            .map(|&i| table.rows()[i].species.as_str())
            .filter(|s| !seen.contains(s))
            .collect();
        if !unseen.is_empty() {
            let mut names: Vec<&str> = unseen.into_iter().collect();
            names.sort_unstable();
            warn!(levels = ?names, "species in test fold never seen in training");
        }
    }

    let (x_train, y_train) = table.design(predictors, train);
    let (x_test, y_test) = table.design(predictors, test);
    let forest = RandomForest::fit(&x_train, &y_train, params)?;
    let predicted = forest.predict(&x_test)?;

    let metrics = FoldMetrics {
        rsq: r_squared(&y_test, &predicted),
        squared_r: pearson_r(&y_test, &predicted).powi(2),
        rmse: rmse(&y_test, &predicted),
    };
    debug!(n_train = train.len(), n_test = test.len(), rsq = metrics.rsq, rmse = metrics.rmse, "fold evaluated");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::tests::obs;
    use crate::observation::Observation;

    fn table() -> ObservationTable {
        let rows: Vec<Observation> = (0..80)
            .map(|i| {
                let mut o = obs(i as f64, (i % 17) as f64, 0.0, if i % 2 == 0 { "a" } else { "b" });
                o.temperature = (i as f64 * 0.3).sin() * 10.0;
                o.leaf_n = 1.5 + 0.05 * o.temperature + if i % 2 == 0 { 0.1 } else { 0.0 };
                o
            })
            .collect();
        ObservationTable::new(rows)
    }

    fn params() -> ForestParams {
        ForestParams { n_trees: 30, min_leaf: 2, ..ForestParams::default() }
    }

    #[test]
    fn metrics_are_bounded_and_informative() {
        let t = table();
        let train: Vec<usize> = (0..80).filter(|i| i % 4 != 0).collect();
        let test: Vec<usize> = (0..80).filter(|i| i % 4 == 0).collect();
        let m = evaluate_fold(&t, &train, &test, &Predictor::ALL, &params()).unwrap();
        assert!(m.rmse >= 0.0);
        assert!(m.rsq <= 1.0);
        assert!(m.rsq > 0.3, "rsq={}", m.rsq);
        assert!((0.0..=1.0).contains(&m.squared_r));
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let t = table();
        let train: Vec<usize> = (20..80).collect();
        let test: Vec<usize> = (0..20).collect();
        let preds = [Predictor::Temperature, Predictor::Species];
        let a = evaluate_fold(&t, &train, &test, &preds, &params()).unwrap();
        let b = evaluate_fold(&t, &train, &test, &preds, &params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unseen_species_level_still_predicts() {
        let t = table();
        // Training only on species "a" (even rows), testing on "b".
        let train: Vec<usize> = (0..80).filter(|i| i % 2 == 0).collect();
        let test: Vec<usize> = (0..80).filter(|i| i % 2 == 1).collect();
        let m = evaluate_fold(&t, &train, &test, &Predictor::ALL, &params()).unwrap();
        assert!(m.rmse.is_finite());
    }

    #[test]
    fn rejects_invalid_folds() {
        let t = table();
        let p = params();
        assert!(matches!(
            evaluate_fold(&t, &[], &[1], &Predictor::ALL, &p),
            Err(Error::EmptyTrainingSet)
        ));
        assert!(matches!(
            evaluate_fold(&t, &[0], &[], &Predictor::ALL, &p),
            Err(Error::EmptyTestSet)
        ));
        assert!(matches!(
            evaluate_fold(&t, &[0, 1, 2], &[2, 3], &Predictor::ALL, &p),
            Err(Error::OverlappingFold(2))
        ));
        assert!(matches!(
            evaluate_fold(&t, &[0, 1], &[500], &Predictor::ALL, &p),
            Err(Error::RowOutOfRange { index: 500, len: 80 })
        ));
    }
}
