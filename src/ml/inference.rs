//! Model Inference
//!
//! `ModelManager` owns the trained model set and the single active model. It is a
//! plain struct mutated through `&mut self`; `SharedModelManager` serializes
//! access for callers that share one manager across threads.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::models::{MLModel, ModelEntry};
use super::scaler::StandardScaler;
use super::selection::select_best;
use super::training::{ModelPerformance, ModelTrainer, TrainingResult};
use super::tuning::{RandomForestTuner, TuningTarget};
use super::{Capabilities, FeatureMatrix, ModelFamily, RegressionMetrics};
use crate::config::{Config, ForecastConfig, TrainingConfig, TuningConfig};
use crate::data::dataset::{feature_matrix, ModelData};
use crate::data::frame::SalesFrame;
use crate::error::{Result, SalesMlError};
use crate::forecast::{ForecastEngine, ForecastPoint, Predictor};

/// The model used for predictions, with the preprocessing it was trained under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveModel {
    pub entry: Arc<ModelEntry>,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
}

impl ActiveModel {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn family(&self) -> ModelFamily {
        self.entry.family()
    }

    pub fn metrics(&self) -> RegressionMetrics {
        self.entry.metrics
    }

    /// Predict raw feature rows, scaling them first when the family needs it
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.feature_names.len()) {
            return Err(SalesMlError::ShapeMismatch {
                expected: self.feature_names.len(),
                actual: row.len(),
            });
        }
        if self.family().uses_scaler() {
            let scaled = self.scaler.transform(rows)?;
            self.entry.model.predict(&scaled)
        } else {
            self.entry.model.predict(rows)
        }
    }
}

/// One feature and its share of the model's importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

pub struct ModelManager {
    training: TrainingConfig,
    tuning: TuningConfig,
    forecast: ForecastConfig,
    capabilities: Capabilities,
    entries: Vec<Arc<ModelEntry>>,
    active: Option<ActiveModel>,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl ModelManager {
    /// Create an empty manager; the optional families are probed once here
    pub fn new(config: &Config) -> Self {
        Self {
            training: config.training.clone(),
            tuning: config.tuning.clone(),
            forecast: config.forecast.clone(),
            capabilities: Capabilities::probe(),
            entries: Vec::new(),
            active: None,
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.capabilities.families()
    }

    pub fn entries(&self) -> &[Arc<ModelEntry>] {
        &self.entries
    }

    pub fn active(&self) -> Option<&ActiveModel> {
        self.active.as_ref()
    }

    fn active_or_err(&self) -> Result<&ActiveModel> {
        self.active.as_ref().ok_or(SalesMlError::NoActiveModel)
    }

    /// Train every available family and make the best one active
    ///
    /// The previous model set, scaler and active model are replaced on success and
    /// left untouched on failure.
    pub fn train(&mut self, features: &FeatureMatrix, target: &[f64]) -> Result<TrainingResult> {
        let trainer = ModelTrainer::new(self.training.clone(), self.capabilities);
        let trained = trainer.train(features, target)?;

        let best = select_best(&trained.entries).ok_or_else(|| {
            SalesMlError::InsufficientData("no model produced a finite R² score".to_string())
        })?;
        let entries: Vec<Arc<ModelEntry>> = trained.entries.into_iter().map(Arc::new).collect();
        let best_entry = Arc::clone(&entries[best]);

        let result = TrainingResult {
            performances: entries.iter().map(|e| ModelPerformance::from(e.as_ref())).collect(),
            best_model: best_entry.name.clone(),
            best_score: best_entry.metrics.r2,
            train_rows: trained.split.train.len(),
            test_rows: trained.split.test.len(),
        };
        info!(
            best_model = %result.best_model,
            r2 = result.best_score,
            "best model selected"
        );

        self.entries = entries;
        self.active = Some(ActiveModel {
            entry: best_entry,
            scaler: trained.scaler,
            feature_names: trained.feature_names,
        });
        Ok(result)
    }

    /// Extract features and `target` from a prepared frame, then train
    pub fn train_frame(&mut self, frame: &SalesFrame, target: &str) -> Result<TrainingResult> {
        let data = ModelData::from_frame(frame, target)?;
        self.train(&data.features, &data.target)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.active_or_err()?.predict(rows)
    }

    /// Predict every row of a prepared frame using the active model's columns
    pub fn predict_frame(&self, frame: &SalesFrame) -> Result<Vec<f64>> {
        let active = self.active_or_err()?;
        let matrix = feature_matrix(frame, &active.feature_names)?;
        active.predict(matrix.rows())
    }

    /// Importances of the active model paired with `names`, highest first
    ///
    /// `Ok(None)` when the active family has no importances.
    pub fn feature_importance(&self, names: &[String]) -> Result<Option<Vec<FeatureImportance>>> {
        let active = self.active_or_err()?;
        let Some(importances) = active.entry.model.feature_importances() else {
            return Ok(None);
        };
        if importances.len() != names.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: importances.len(),
                actual: names.len(),
            });
        }

        let mut ranked: Vec<FeatureImportance> = names
            .iter()
            .zip(importances)
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(Some(ranked))
    }

    /// All trained models by descending R², metrics rounded to 4 decimals
    pub fn model_comparison(&self) -> Vec<ModelPerformance> {
        let mut rows: Vec<ModelPerformance> = self
            .entries
            .iter()
            .map(|e| {
                let mut row = ModelPerformance::from(e.as_ref());
                row.metrics = row.metrics.rounded(4);
                row
            })
            .collect();
        rows.sort_by(|a, b| b.metrics.r2.total_cmp(&a.metrics.r2));
        rows
    }

    /// Predicted value per row times the expected number of lifetime orders
    pub fn customer_lifetime_value(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let lifetime = self.forecast.clv_lifetime_orders;
        Ok(self.predict(rows)?.into_iter().map(|p| p * lifetime).collect())
    }

    /// Monthly forecast from the active model over a prepared history
    pub fn forecast(&self, history: &SalesFrame, periods_ahead: usize) -> Result<Vec<ForecastPoint>> {
        ForecastEngine::new(self).forecast(history, periods_ahead)
    }

    /// Forecast the configured number of months
    pub fn forecast_default(&self, history: &SalesFrame) -> Result<Vec<ForecastPoint>> {
        self.forecast(history, self.forecast.periods_ahead)
    }

    /// Grid-search the requested family and promote the result to active
    ///
    /// Unsupported choices are logged and yield `Ok(None)` with the active model
    /// unchanged.
    pub fn tune(
        &mut self,
        features: &FeatureMatrix,
        target: &[f64],
        model_choice: &str,
    ) -> Result<Option<Arc<ModelEntry>>> {
        let tuning_target = match TuningTarget::parse(model_choice) {
            Ok(t) => t,
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "hyperparameter tuning skipped");
                return Ok(None);
            }
        };

        let outcome = match tuning_target {
            TuningTarget::RandomForest => {
                RandomForestTuner::new(self.tuning.clone(), self.training.seed).tune(features, target)?
            }
        };
        let entry = Arc::new(outcome.entry);
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = Arc::clone(&entry),
            None => self.entries.push(Arc::clone(&entry)),
        }
        info!(
            model = %entry.name,
            n_trees = outcome.params.n_trees,
            max_depth = ?outcome.params.max_depth,
            cv_r2 = entry.metrics.r2,
            "tuned model is now active"
        );

        self.active = Some(ActiveModel {
            entry: Arc::clone(&entry),
            scaler: outcome.scaler,
            feature_names: features.feature_names().to_vec(),
        });
        Ok(Some(entry))
    }

    /// Replace the active model, e.g. after loading an artifact
    pub fn install(&mut self, active: ActiveModel) {
        if !self.entries.iter().any(|e| Arc::ptr_eq(e, &active.entry)) {
            self.entries.retain(|e| e.name != active.entry.name);
            self.entries.push(Arc::clone(&active.entry));
        }
        self.active = Some(active);
    }
}

impl Predictor for ModelManager {
    fn feature_names(&self) -> Result<&[String]> {
        Ok(&self.active_or_err()?.feature_names)
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        ModelManager::predict(self, rows)
    }
}

/// A `ModelManager` shared between threads; every call holds the lock
#[derive(Clone, Default)]
pub struct SharedModelManager(Arc<Mutex<ModelManager>>);

impl SharedModelManager {
    pub fn new(manager: ModelManager) -> Self {
        Self(Arc::new(Mutex::new(manager)))
    }

    pub fn lock(&self) -> MutexGuard<'_, ModelManager> {
        self.0.lock()
    }

    pub fn train(&self, features: &FeatureMatrix, target: &[f64]) -> Result<TrainingResult> {
        self.lock().train(features, target)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.lock().predict(rows)
    }

    pub fn tune(
        &self,
        features: &FeatureMatrix,
        target: &[f64],
        model_choice: &str,
    ) -> Result<Option<Arc<ModelEntry>>> {
        self.lock().tune(features, target, model_choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![(i % 10) as f64, ((i * 7) % 9) as f64, 1.0])
            .collect();
        let y = rows.iter().map(|r| 10.0 * r[0] - 2.0 * r[1] + 5.0).collect();
        let names = vec!["QUANTITYORDERED".into(), "PRICEEACH".into(), "ORDER_COUNT".into()];
        (FeatureMatrix::new(rows, names).unwrap(), y)
    }

    fn manager() -> ModelManager {
        let mut config = Config::default();
        config.training.n_estimators = 15;
        config.tuning.tree_counts = vec![5, 10];
        config.tuning.max_depths = vec![0, 3];
        ModelManager::new(&config).with_capabilities(Capabilities::probe())
    }

    #[test]
    fn test_predict_without_model() {
        let m = manager();
        assert!(matches!(m.predict(&[vec![1.0, 2.0, 1.0]]), Err(SalesMlError::NoActiveModel)));
        assert!(matches!(m.feature_importance(&[]), Err(SalesMlError::NoActiveModel)));
        assert!(m.model_comparison().is_empty());
    }

    #[test]
    fn test_train_selects_highest_r2() {
        let (x, y) = dataset(60);
        let mut m = manager();
        let result = m.train(&x, &y).unwrap();
        assert_eq!(result.performances.len(), Capabilities::probe().families().len());
        let max = result
            .performances
            .iter()
            .map(|p| p.metrics.r2)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best_score, max);
        assert_eq!(m.active().unwrap().name(), result.best_model);
        // the exact linear signal
        assert_eq!(result.best_model, "Linear_Regression");
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = dataset(30);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        assert!(matches!(
            m.predict(&[vec![1.0]]),
            Err(SalesMlError::ShapeMismatch { expected: 3, actual: 1 })
        ));
        let preds = m.predict(&x.rows()[..2]).unwrap();
        assert!((preds[0] - y[0]).abs() < 1e-6);
    }

    #[test]
    fn test_linear_importance_is_none() {
        let (x, y) = dataset(60);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        assert!(m.feature_importance(x.feature_names()).unwrap().is_none());
    }

    #[test]
    fn test_comparison_sorted_descending() {
        let (x, y) = dataset(60);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        let rows = m.model_comparison();
        assert!(rows.windows(2).all(|w| w[0].metrics.r2 >= w[1].metrics.r2));
    }

    #[test]
    fn test_customer_lifetime_value_scales_predictions() {
        let (x, y) = dataset(40);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        let preds = m.predict(&x.rows()[..3]).unwrap();
        let clv = m.customer_lifetime_value(&x.rows()[..3]).unwrap();
        for (p, c) in preds.iter().zip(clv) {
            assert!((c - p * 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unsupported_tuning_keeps_active_model() {
        let (x, y) = dataset(40);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        let before = m.active().unwrap().name().to_string();
        assert!(m.tune(&x, &y, "Logistic Regression").unwrap().is_none());
        assert_eq!(m.active().unwrap().name(), before);
    }

    #[test]
    fn test_tuned_forest_becomes_active() {
        let (x, y) = dataset(30);
        let mut m = manager();
        m.train(&x, &y).unwrap();
        let entry = m.tune(&x, &y, "Random Forest").unwrap().unwrap();
        assert_eq!(entry.name, "Random_Forest_Tuned");
        assert_eq!(m.active().unwrap().name(), "Random_Forest_Tuned");
        assert_eq!(m.entries().len(), 6);
        let ranked = m.feature_importance(x.feature_names()).unwrap().unwrap();
        assert_eq!(ranked[0].feature, "QUANTITYORDERED");

        // retuning replaces the tuned entry
        m.tune(&x, &y, "RandomForest").unwrap();
        assert_eq!(m.entries().len(), 6);
    }

    #[test]
    fn test_shared_manager_serializes_calls() {
        let (x, y) = dataset(30);
        let shared = SharedModelManager::new(manager());
        shared.train(&x, &y).unwrap();
        let other = shared.clone();
        let handle = std::thread::spawn(move || other.predict(&[vec![1.0, 1.0, 1.0]]).unwrap());
        assert_eq!(handle.join().unwrap().len(), 1);
    }
}
