//! Gradient boosted regression trees
//!
//! One squared-loss engine with two presets:
//! - classic gradient boosting: depth 3, exact splits
//! - XGBoost style: depth 6, L2 leaf penalty, 256-bin histograms, used when the
//!   `xgboost` feature is off
//!
//! LightGBM has no preset here; it only trains through `lightgbm3`.
//!
//! Each round fits a tree to the gradient `prediction - target` (hessian 1) and
//! adds it scaled by the learning rate. The first prediction is the target mean.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{FeatureBins, RegressionTree, SplitMethod, TreeGrower, TreeParams};
use crate::error::{Result, SalesMlError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub split: SplitMethod,
    pub tree: TreeParams,
}

impl BoostingParams {
    pub fn gradient_boosting(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.1,
            split: SplitMethod::Exact,
            tree: TreeParams {
                max_depth: Some(3),
                min_child_weight: 1.0,
                lambda: 0.0,
                gamma: 0.0,
            },
        }
    }

    pub fn xgboost(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.3,
            split: SplitMethod::Histogram { max_bins: 256 },
            tree: TreeParams {
                max_depth: Some(6),
                min_child_weight: 1.0,
                lambda: 1.0,
                gamma: 0.0,
            },
        }
    }

    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

/// Fitted boosted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    importances: Vec<f64>,
}

impl GradientBoostedTrees {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: BoostingParams) -> Result<Self> {
        if rows.len() != y.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: rows.len(),
                actual: y.len(),
            });
        }
        if rows.is_empty() {
            return Err(SalesMlError::InsufficientData(
                "cannot fit boosted trees on zero rows".to_string(),
            ));
        }

        let bins = FeatureBins::build(rows, params.split);
        let binned = bins.bin_rows(rows);
        let grower = TreeGrower::new(&bins, &binned, params.tree);

        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut predictions = vec![base_score; y.len()];
        let hess = vec![1.0; y.len()];
        let mut gains = vec![0.0; bins.n_features()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let grad: Vec<f64> = predictions.iter().zip(y).map(|(p, t)| p - t).collect();
            let (tree, tree_gains) = grower.grow((0..y.len()).collect(), &grad, &hess);
            for (row, pred) in rows.iter().zip(predictions.iter_mut()) {
                *pred += params.learning_rate * tree.predict_row(row);
            }
            for (total, g) in gains.iter_mut().zip(tree_gains) {
                *total += g;
            }
            trees.push(tree);
        }

        let importances = normalize_gains(gains);
        debug!(
            trees = trees.len(),
            leaves = trees.iter().map(RegressionTree::n_leaves).sum::<usize>(),
            "boosted ensemble fitted"
        );

        Ok(Self {
            params,
            base_score,
            trees,
            importances,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.params.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Total split gain per feature, normalized to sum to 1 (all zero without splits)
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

/// Scale per-feature gains to sum to 1; all-zero gains are returned unchanged
pub fn normalize_gains(mut gains: Vec<f64>) -> Vec<f64> {
    let total: f64 = gains.iter().sum();
    if total > 0.0 {
        gains.iter_mut().for_each(|g| *g /= total);
    }
    gains
}
