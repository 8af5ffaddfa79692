//! Hyperparameter search
//!
//! Exhaustive grid over random forest tree counts and depth limits, scored by
//! mean R² across contiguous K folds.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metrics::evaluate;
use super::models::{FittedModel, ModelEntry};
use super::scaler::StandardScaler;
use super::selection::best_index;
use super::smartcore::{ForestParams, RandomForest};
use super::{FeatureMatrix, ModelFamily, RegressionMetrics};
use crate::config::TuningConfig;
use crate::error::{Result, SalesMlError};

/// Name given to the promoted result of a random forest search
pub const TUNED_FOREST_NAME: &str = "Random_Forest_Tuned";

/// Families that support tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningTarget {
    RandomForest,
}

impl TuningTarget {
    /// Accepts "Random Forest", "Random_Forest" and "RandomForest", case-insensitively
    pub fn parse(choice: &str) -> Result<Self> {
        let normalized: String = choice
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "randomforest" => Ok(TuningTarget::RandomForest),
            _ => Err(SalesMlError::UnsupportedTuningTarget(choice.to_string())),
        }
    }
}

/// Contiguous K-fold partition; the first `n % k` folds get one extra row
pub fn kfold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let test: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..n).collect();
        folds.push((train, test));
        start += size;
    }
    folds
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub mean_metrics: RegressionMetrics,
}

#[derive(Debug)]
pub struct TuningOutcome {
    pub entry: ModelEntry,
    pub scaler: StandardScaler,
    pub params: ForestParams,
    pub candidates: Vec<CandidateScore>,
}

pub struct RandomForestTuner {
    config: TuningConfig,
    seed: u64,
}

impl RandomForestTuner {
    pub fn new(config: TuningConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// Candidate parameters in search order
    pub fn grid(&self) -> Vec<ForestParams> {
        self.config
            .max_depths
            .iter()
            .cartesian_product(&self.config.tree_counts)
            .map(|(&depth, &n_trees)| ForestParams {
                n_trees,
                max_depth: (depth > 0).then_some(depth),
                seed: self.seed,
            })
            .collect()
    }

    pub fn tune(&self, features: &FeatureMatrix, target: &[f64]) -> Result<TuningOutcome> {
        if features.n_rows() != target.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: features.n_rows(),
                actual: target.len(),
            });
        }
        let k = self.config.folds;
        if target.len() < k {
            return Err(SalesMlError::InsufficientData(format!(
                "{} rows cannot be split into {k} folds",
                target.len()
            )));
        }

        let scaler = StandardScaler::fit(features.rows())?;
        let rows = scaler.transform(features.rows())?;
        let folds = kfold_indices(rows.len(), k);

        let mut candidates = Vec::new();
        for params in self.grid() {
            let mut fold_metrics = Vec::with_capacity(k);
            for (train, test) in &folds {
                let x_train: Vec<Vec<f64>> = train.iter().map(|&i| rows[i].clone()).collect();
                let y_train: Vec<f64> = train.iter().map(|&i| target[i]).collect();
                let x_test: Vec<Vec<f64>> = test.iter().map(|&i| rows[i].clone()).collect();
                let y_test: Vec<f64> = test.iter().map(|&i| target[i]).collect();

                let forest = RandomForest::fit(&x_train, &y_train, params)?;
                fold_metrics.push(evaluate(&y_test, &forest.predict(&x_test)?)?);
            }
            let mean_metrics = mean_metrics(&fold_metrics);
            debug!(
                n_trees = params.n_trees,
                max_depth = ?params.max_depth,
                mean_r2 = mean_metrics.r2,
                "grid candidate scored"
            );
            candidates.push(CandidateScore {
                params,
                mean_metrics,
            });
        }

        let best = best_index(candidates.iter().map(|c| c.mean_metrics.r2).collect::<Vec<_>>())
            .ok_or_else(|| {
                SalesMlError::training(ModelFamily::RandomForest, "no grid candidate scored")
            })?;
        let CandidateScore {
            params,
            mean_metrics,
        } = candidates[best].clone();

        let forest = RandomForest::fit(&rows, target, params)?.with_permutation_importance(&rows, target)?;
        let entry =
            ModelEntry::new(FittedModel::Forest(forest), mean_metrics).named(TUNED_FOREST_NAME);

        Ok(TuningOutcome {
            entry,
            scaler,
            params,
            candidates,
        })
    }
}

fn mean_metrics(folds: &[RegressionMetrics]) -> RegressionMetrics {
    let n = folds.len().max(1) as f64;
    let avg = |f: fn(&RegressionMetrics) -> f64| folds.iter().map(f).sum::<f64>() / n;
    RegressionMetrics::new(
        avg(|m| m.mse),
        avg(|m| m.rmse),
        avg(|m| m.mae),
        avg(|m| m.r2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Random Forest")]
    #[case("Random_Forest")]
    #[case("RandomForest")]
    #[case("random forest")]
    fn test_parse_random_forest(#[case] choice: &str) {
        assert_eq!(TuningTarget::parse(choice).unwrap(), TuningTarget::RandomForest);
    }

    #[rstest]
    #[case("Logistic Regression")]
    #[case("XGBoost")]
    #[case("")]
    fn test_parse_unsupported(#[case] choice: &str) {
        assert!(matches!(
            TuningTarget::parse(choice),
            Err(SalesMlError::UnsupportedTuningTarget(_))
        ));
    }

    #[test]
    fn test_kfold_is_contiguous_and_complete() {
        let folds = kfold_indices(10, 3);
        assert_eq!(folds[0].1, vec![0, 1, 2, 3]);
        assert_eq!(folds[1].1, vec![4, 5, 6]);
        assert_eq!(folds[2].1, vec![7, 8, 9]);
        assert_eq!(folds[1].0, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_default_grid() {
        let tuner = RandomForestTuner::new(TuningConfig::default(), 42);
        let grid = tuner.grid();
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0].max_depth, None);
        assert_eq!(grid[0].n_trees, 50);
        assert_eq!(grid[8].max_depth, Some(20));
        assert_eq!(grid[8].n_trees, 200);
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let x = FeatureMatrix::new(vec![vec![1.0], vec![2.0]], vec!["a".into()]).unwrap();
        let tuner = RandomForestTuner::new(TuningConfig::default(), 42);
        assert!(matches!(
            tuner.tune(&x, &[1.0, 2.0]),
            Err(SalesMlError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_tune_scores_every_candidate() {
        let rows: Vec<Vec<f64>> = (0..24).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 3.0 * r[0] + r[1]).collect();
        let x = FeatureMatrix::new(rows, vec!["a".into(), "b".into()]).unwrap();
        let config = TuningConfig {
            tree_counts: vec![5, 10],
            max_depths: vec![0, 2],
            ..TuningConfig::default()
        };
        let outcome = RandomForestTuner::new(config, 42).tune(&x, &y).unwrap();
        assert_eq!(outcome.candidates.len(), 4);
        assert_eq!(outcome.entry.name, TUNED_FOREST_NAME);
        let best = outcome
            .candidates
            .iter()
            .map(|c| c.mean_metrics.r2)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.entry.metrics.r2, best);
    }
}
