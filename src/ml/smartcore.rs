//! SmartCore random forest wrapper
//!
//! Bootstrapped regression trees from `smartcore`. The library exposes no
//! importances, so they are measured by permutation on the training rows.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::debug;

use super::metrics::permutation_importance;
use super::ModelFamily;
use crate::error::{Result, SalesMlError};

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows every tree until its leaves are pure
    pub max_depth: Option<u16>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn new(n_trees: usize, max_depth: Option<u16>) -> Self {
        Self {
            n_trees,
            max_depth,
            ..Self::default()
        }
    }

    fn to_smartcore(self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: self.max_depth,
            min_samples_leaf: 1,
            min_samples_split: 2,
            n_trees: self.n_trees,
            m: Some(n_features.max(1)), // every feature is a split candidate
            keep_samples: false,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    model: Forest,
    n_features: usize,
    importances: Option<Vec<f64>>,
}

impl RandomForest {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        if rows.len() != y.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: rows.len(),
                actual: y.len(),
            });
        }
        if rows.is_empty() {
            return Err(SalesMlError::InsufficientData(
                "cannot train a random forest on zero rows".to_string(),
            ));
        }

        let x = to_dense(rows)?;
        let n_features = rows[0].len();
        let model = Forest::fit(&x, &y.to_vec(), params.to_smartcore(n_features))
            .map_err(|e| SalesMlError::training(ModelFamily::RandomForest, format!("{e:?}")))?;
        debug!(
            n_trees = params.n_trees,
            max_depth = ?params.max_depth,
            rows = rows.len(),
            "random forest fitted"
        );

        Ok(Self {
            params,
            model,
            n_features,
            importances: None,
        })
    }

    /// Attach permutation importances measured on `rows`/`y`
    pub fn with_permutation_importance(mut self, rows: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        let importances =
            permutation_importance(rows, y, self.n_features, self.params.seed, |x| self.predict(x))?;
        self.importances = Some(importances);
        Ok(self)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = to_dense(rows)?;
        self.model
            .predict(&x)
            .map_err(|e| SalesMlError::training(ModelFamily::RandomForest, format!("prediction failed: {e:?}")))
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn to_dense(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    let n_features = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for row in rows {
        if row.len() != n_features {
            return Err(SalesMlError::ShapeMismatch {
                expected: n_features,
                actual: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(rows.len(), n_features, flat, false))
}
