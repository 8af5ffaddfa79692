//! Model Training Pipeline
//!
//! Fits every available model family on one seeded train/test split and scores
//! each on the held-out rows.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::metrics::evaluate;
use super::models::{FitSettings, FittedModel, MLModel, ModelEntry};
use super::scaler::StandardScaler;
use super::{Capabilities, FeatureMatrix, ModelFamily, RegressionMetrics};
use crate::config::TrainingConfig;
use crate::error::{Result, SalesMlError};

/// Row indices of a shuffled train/test partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n` with `seed`; the first `ceil(n * test_fraction)` indices are the test set
    pub fn new(n: usize, test_fraction: f64, seed: u64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(SalesMlError::InsufficientData(format!(
                "test fraction must be between 0 and 1, got {test_fraction}"
            )));
        }
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        let n_train = n.saturating_sub(n_test);
        if n_train < 2 || n_test < 1 {
            return Err(SalesMlError::InsufficientData(format!(
                "{n} rows give {n_train} training and {n_test} test rows; need at least 2 and 1"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let train = indices.split_off(n_test);
        Ok(Self {
            train,
            test: indices,
        })
    }
}

/// Metrics row for one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub name: String,
    pub family: ModelFamily,
    pub metrics: RegressionMetrics,
}

impl From<&ModelEntry> for ModelPerformance {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            name: entry.name.clone(),
            family: entry.family(),
            metrics: entry.metrics,
        }
    }
}

/// Summary handed back to callers after a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub performances: Vec<ModelPerformance>,
    pub best_model: String,
    pub best_score: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Everything a training run produced
#[derive(Debug)]
pub struct TrainedModels {
    pub entries: Vec<ModelEntry>,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    pub split: TrainTestSplit,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
    capabilities: Capabilities,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.capabilities.families()
    }

    fn settings(&self) -> FitSettings {
        FitSettings {
            n_estimators: self.config.n_estimators,
            seed: self.config.seed,
        }
    }

    /// Fit and score every family in registry order
    pub fn train(&self, features: &FeatureMatrix, target: &[f64]) -> Result<TrainedModels> {
        if features.n_rows() != target.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: features.n_rows(),
                actual: target.len(),
            });
        }
        if target.is_empty() {
            return Err(SalesMlError::InsufficientData(
                "target vector is empty".to_string(),
            ));
        }
        if features.n_features() == 0 {
            return Err(SalesMlError::InsufficientData(
                "no feature columns to train on".to_string(),
            ));
        }

        let split = TrainTestSplit::new(target.len(), self.config.test_fraction, self.config.seed)?;
        let x_train = features.select_rows(&split.train).into_rows();
        let x_test = features.select_rows(&split.test).into_rows();
        let y_train: Vec<f64> = split.train.iter().map(|&i| target[i]).collect();
        let y_test: Vec<f64> = split.test.iter().map(|&i| target[i]).collect();

        let scaler = StandardScaler::fit(&x_train)?;
        let x_train_scaled = scaler.transform(&x_train)?;
        let x_test_scaled = scaler.transform(&x_test)?;

        info!(
            train_rows = y_train.len(),
            test_rows = y_test.len(),
            features = features.n_features(),
            "training models"
        );

        let mut entries = Vec::new();
        for family in self.families() {
            let (fit_rows, eval_rows) = if family.uses_scaler() {
                (&x_train_scaled, &x_test_scaled)
            } else {
                (&x_train, &x_test)
            };

            let model = FittedModel::fit(family, fit_rows, &y_train, self.settings())?
                .with_importances(fit_rows, &y_train)?;
            let predictions = model.predict(eval_rows)?;
            let metrics = evaluate(&y_test, &predictions)?;
            info!(
                model = %family,
                rmse = metrics.rmse,
                r2 = metrics.r2,
                "model evaluated"
            );
            entries.push(ModelEntry::new(model, metrics));
        }
        debug!(models = entries.len(), "training run complete");

        Ok(TrainedModels {
            entries,
            scaler,
            feature_names: features.feature_names().to_vec(),
            split,
        })
    }
}
