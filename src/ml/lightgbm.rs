//! LightGBM regressor through `lightgbm3`
//!
//! Leaf-wise boosted trees with 31 leaves, 255 feature bins and at least 20 rows
//! per leaf. The fitted booster is kept in LightGBM's text model format so the
//! model stays `Send + Sync` and serializes with the rest of the artifact;
//! prediction restores a booster from that text.

use lightgbm3::{Booster, Dataset, ImportanceType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::boosting::normalize_gains;
use super::ModelFamily;
use crate::error::{Result, SalesMlError};

const FAMILY: ModelFamily = ModelFamily::LightGBMLike;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightGbmParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub min_data_in_leaf: usize,
    pub max_bin: usize,
    pub seed: u64,
}

impl LightGbmParams {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            learning_rate: 0.1,
            num_leaves: 31,
            min_data_in_leaf: 20,
            max_bin: 255,
            seed,
        }
    }

    fn to_json(self) -> Value {
        json!({
            "objective": "regression",
            "num_iterations": self.n_estimators,
            "learning_rate": self.learning_rate,
            "num_leaves": self.num_leaves,
            "min_data_in_leaf": self.min_data_in_leaf,
            "max_bin": self.max_bin,
            "seed": self.seed,
            "deterministic": true,
            "num_threads": 1,
            "device_type": "cpu",
            "verbosity": -1,
        })
    }
}

/// Fitted LightGBM booster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGbmRegressor {
    params: LightGbmParams,
    model: String,
    importances: Vec<f64>,
}

impl LightGbmRegressor {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: LightGbmParams) -> Result<Self> {
        if rows.len() != y.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: rows.len(),
                actual: y.len(),
            });
        }
        if rows.is_empty() {
            return Err(SalesMlError::InsufficientData(
                "cannot fit LightGBM on zero rows".to_string(),
            ));
        }

        let labels: Vec<f32> = y.iter().map(|v| *v as f32).collect();
        let dataset = Dataset::from_vec_of_vec(rows.to_vec(), labels, true)
            .map_err(|e| SalesMlError::training(FAMILY, e))?;
        let booster =
            Booster::train(dataset, &params.to_json()).map_err(|e| SalesMlError::training(FAMILY, e))?;

        let gains = booster
            .feature_importance(ImportanceType::Gain)
            .map_err(|e| SalesMlError::training(FAMILY, e))?;
        let model = booster
            .save_string()
            .map_err(|e| SalesMlError::training(FAMILY, e))?;
        debug!(rounds = params.n_estimators, bytes = model.len(), "LightGBM booster fitted");

        Ok(Self {
            params,
            model,
            importances: normalize_gains(gains),
        })
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let booster =
            Booster::from_string(&self.model).map_err(|e| SalesMlError::training(FAMILY, e))?;
        booster
            .predict_from_vec_of_vec(rows.to_vec(), true)
            .map_err(|e| SalesMlError::training(FAMILY, e))
    }

    /// Split gain per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn params(&self) -> &LightGbmParams {
        &self.params
    }
}
