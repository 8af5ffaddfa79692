//! Machine Learning Module
//!
//! Regression models for the profit target:
//! - Ordinary least squares
//! - Random forest (smartcore)
//! - Classic gradient boosted trees (built-in engine)
//! - XGBoost (libxgboost with the `xgboost` feature, built-in histogram booster otherwise)
//! - LightGBM (`lightgbm3`, only with the `leafwise` feature)
//!
//! # Architecture
//! - `training` fits every available family on a seeded train/test split
//! - `selection` picks the best family by R²
//! - `inference` owns the active model and serves predictions
//! - `tuning` runs a cross-validated grid search for the random forest
//! - `persistence` saves and restores the active model

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::error::{Result, SalesMlError};

pub mod boosting;
pub mod inference;
#[cfg(feature = "leafwise")]
pub mod lightgbm;
pub mod linear;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod scaler;
pub mod selection;
pub mod smartcore;
pub mod training;
pub mod tree;
pub mod tuning;
#[cfg(feature = "xgboost")]
pub mod xgboost;

/// Regression model families, in registry order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ModelFamily {
    #[strum(serialize = "Linear_Regression")]
    LinearRegression,
    #[strum(serialize = "Random_Forest")]
    RandomForest,
    #[strum(serialize = "Gradient_Boosting")]
    GradientBoosting,
    #[strum(serialize = "XGBoost")]
    XGBoostLike,
    #[strum(serialize = "LightGBM")]
    LightGBMLike,
}

impl ModelFamily {
    /// Whether the family is fit and evaluated on standardized features
    pub fn uses_scaler(self) -> bool {
        matches!(
            self,
            ModelFamily::LinearRegression | ModelFamily::RandomForest | ModelFamily::GradientBoosting
        )
    }
}

/// Optional model families compiled into this build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub leafwise: bool,
}

impl Capabilities {
    pub fn probe() -> Self {
        Self {
            leafwise: cfg!(feature = "leafwise"),
        }
    }

    pub fn supports(&self, family: ModelFamily) -> bool {
        match family {
            ModelFamily::LightGBMLike => self.leafwise,
            _ => true,
        }
    }

    /// Families to instantiate, in registry order
    pub fn families(&self) -> Vec<ModelFamily> {
        ModelFamily::iter().filter(|f| self.supports(*f)).collect()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::probe()
    }
}

/// Held-out evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn new(mse: f64, rmse: f64, mae: f64, r2: f64) -> Self {
        Self { mse, rmse, mae, r2 }
    }

    /// Copy with every metric rounded to `decimals` places, for display tables
    pub fn rounded(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        let round = |v: f64| (v * factor).round() / factor;
        Self::new(round(self.mse), round(self.rmse), round(self.mae), round(self.r2))
    }
}

/// Dense row-major feature matrix with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    feature_names: Vec<String>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<Vec<f64>>, feature_names: Vec<String>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != feature_names.len()) {
            return Err(SalesMlError::ShapeMismatch {
                expected: feature_names.len(),
                actual: row.len(),
            });
        }
        Ok(Self {
            rows,
            feature_names,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[index]).collect()
    }

    /// Column means; all zero for an empty matrix
    pub fn column_means(&self) -> Vec<f64> {
        let n = self.rows.len();
        if n == 0 {
            return vec![0.0; self.n_features()];
        }
        (0..self.n_features())
            .map(|j| self.rows.iter().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect()
    }

    /// New matrix holding the rows at `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
        }
    }
}
