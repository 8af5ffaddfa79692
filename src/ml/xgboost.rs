//! XGBoost regressor through libxgboost
//!
//! Depth 6, learning rate 0.3, L2 leaf penalty 1 and the `hist` tree method
//! with 256 bins. The booster is saved to a scratch file after training and its
//! bytes kept in memory; prediction loads them back the same way. Importances
//! are measured by permutation, like the random forest's.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use xgboost_rust as xgb;

use super::metrics::permutation_importance;
use super::ModelFamily;
use crate::error::{Result, SalesMlError};

const FAMILY: ModelFamily = ModelFamily::XGBoostLike;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XGBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub max_bin: usize,
    pub seed: u64,
}

impl XGBoostParams {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            max_bin: 256,
            seed,
        }
    }

    fn to_pairs(self) -> Vec<(&'static str, String)> {
        vec![
            ("objective", "reg:squarederror".to_string()),
            ("tree_method", "hist".to_string()),
            ("eta", self.learning_rate.to_string()),
            ("max_depth", self.max_depth.to_string()),
            ("lambda", self.lambda.to_string()),
            ("max_bin", self.max_bin.to_string()),
            ("seed", self.seed.to_string()),
            ("nthread", "1".to_string()),
            ("verbosity", "0".to_string()),
        ]
    }
}

/// Fitted XGBoost booster, held as its saved model bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    params: XGBoostParams,
    model: Vec<u8>,
    n_features: usize,
    importances: Option<Vec<f64>>,
}

impl XGBoostRegressor {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: XGBoostParams) -> Result<Self> {
        if rows.len() != y.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: rows.len(),
                actual: y.len(),
            });
        }
        if rows.is_empty() {
            return Err(SalesMlError::InsufficientData(
                "cannot fit XGBoost on zero rows".to_string(),
            ));
        }

        let mut dtrain = dense_matrix(rows)?;
        let labels: Vec<f32> = y.iter().map(|v| *v as f32).collect();
        dtrain
            .set_labels(&labels)
            .map_err(|e| SalesMlError::training(FAMILY, e))?;

        let owned = params.to_pairs();
        let pairs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let booster = xgb::Booster::train(&dtrain, &pairs, params.n_estimators as _, &[])
            .map_err(|e| SalesMlError::training(FAMILY, e))?;

        let path = scratch_path();
        booster
            .save(path_str(&path)?)
            .map_err(|e| SalesMlError::training(FAMILY, e))?;
        let model = fs::read(&path);
        let _ = fs::remove_file(&path);
        let model = model?;
        debug!(rounds = params.n_estimators, bytes = model.len(), "XGBoost booster fitted");

        Ok(Self {
            params,
            model,
            n_features: rows[0].len(),
            importances: None,
        })
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(SalesMlError::ShapeMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let path = scratch_path();
        fs::write(&path, &self.model)?;
        let booster = xgb::Booster::load(path_str(&path)?);
        let _ = fs::remove_file(&path);
        let booster = booster.map_err(|e| SalesMlError::training(FAMILY, e))?;

        let dmatrix = dense_matrix(rows)?;
        let predictions = booster
            .predict(&dmatrix)
            .map_err(|e| SalesMlError::training(FAMILY, e))?;
        Ok(predictions.into_iter().map(f64::from).collect())
    }

    /// Attach permutation importances measured on `rows`/`y`
    pub fn with_permutation_importance(mut self, rows: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        let importances =
            permutation_importance(rows, y, self.n_features, self.params.seed, |x| self.predict(x))?;
        self.importances = Some(importances);
        Ok(self)
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &XGBoostParams {
        &self.params
    }
}

fn dense_matrix(rows: &[Vec<f64>]) -> Result<xgb::DMatrix> {
    let flat: Vec<f32> = rows.iter().flatten().map(|v| *v as f32).collect();
    xgb::DMatrix::from_dense(&flat, rows.len()).map_err(|e| SalesMlError::training(FAMILY, e))
}

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("xgboost-{}.json", Uuid::new_v4()))
}

fn path_str(path: &std::path::Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| SalesMlError::training(FAMILY, "temporary path is not valid UTF-8"))
}
