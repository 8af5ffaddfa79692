//! Model Definitions
//!
//! The `MLModel` trait and the closed set of fitted estimators behind it.

use serde::{Deserialize, Serialize};

use super::boosting::{BoostingParams, GradientBoostedTrees};
#[cfg(feature = "leafwise")]
use super::lightgbm::{LightGbmParams, LightGbmRegressor};
use super::linear::LinearRegression;
use super::smartcore::{ForestParams, RandomForest};
#[cfg(feature = "xgboost")]
use super::xgboost::{XGBoostParams, XGBoostRegressor};
use super::{ModelFamily, RegressionMetrics};
use crate::error::Result;

/// Trait for fitted regression models
pub trait MLModel: Send + Sync {
    /// Predict one value per row
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn family(&self) -> ModelFamily;

    /// Native importances aligned with the training columns, if the model has any
    fn feature_importances(&self) -> Option<Vec<f64>>;
}

/// Settings shared by the family constructors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
        }
    }
}

/// A fitted estimator of any family
///
/// `Boosted` is the built-in engine: classic gradient boosting always, and the
/// XGBoost family when libxgboost is not compiled in.
#[derive(Debug, Serialize, Deserialize)]
pub enum FittedModel {
    Linear(LinearRegression),
    Forest(RandomForest),
    Boosted {
        family: ModelFamily,
        model: GradientBoostedTrees,
    },
    #[cfg(feature = "xgboost")]
    XGBoost(XGBoostRegressor),
    #[cfg(feature = "leafwise")]
    LightGbm(LightGbmRegressor),
}

impl FittedModel {
    /// Fit `family` with its default hyperparameters
    pub fn fit(
        family: ModelFamily,
        rows: &[Vec<f64>],
        y: &[f64],
        settings: FitSettings,
    ) -> Result<Self> {
        let n = settings.n_estimators;
        let model = match family {
            ModelFamily::LinearRegression => FittedModel::Linear(LinearRegression::fit(rows, y)?),
            ModelFamily::RandomForest => FittedModel::Forest(RandomForest::fit(
                rows,
                y,
                ForestParams {
                    n_trees: n,
                    max_depth: None,
                    seed: settings.seed,
                },
            )?),
            ModelFamily::GradientBoosting => FittedModel::Boosted {
                family,
                model: GradientBoostedTrees::fit(rows, y, BoostingParams::gradient_boosting(n))?,
            },
            #[cfg(feature = "xgboost")]
            ModelFamily::XGBoostLike => FittedModel::XGBoost(XGBoostRegressor::fit(
                rows,
                y,
                XGBoostParams::new(n, settings.seed),
            )?),
            #[cfg(not(feature = "xgboost"))]
            ModelFamily::XGBoostLike => FittedModel::Boosted {
                family,
                model: GradientBoostedTrees::fit(rows, y, BoostingParams::xgboost(n))?,
            },
            #[cfg(feature = "leafwise")]
            ModelFamily::LightGBMLike => FittedModel::LightGbm(LightGbmRegressor::fit(
                rows,
                y,
                LightGbmParams::new(n, settings.seed),
            )?),
            #[cfg(not(feature = "leafwise"))]
            ModelFamily::LightGBMLike => {
                return Err(crate::error::SalesMlError::FamilyUnavailable(family))
            }
        };
        Ok(model)
    }

    /// Measure importances that are not a by-product of fitting (permutation based)
    pub fn with_importances(self, rows: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        match self {
            FittedModel::Forest(forest) => Ok(FittedModel::Forest(
                forest.with_permutation_importance(rows, y)?,
            )),
            #[cfg(feature = "xgboost")]
            FittedModel::XGBoost(model) => Ok(FittedModel::XGBoost(
                model.with_permutation_importance(rows, y)?,
            )),
            other => Ok(other),
        }
    }
}

impl MLModel for FittedModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        match self {
            FittedModel::Linear(model) => Ok(model.predict(rows)),
            FittedModel::Forest(model) => model.predict(rows),
            FittedModel::Boosted { model, .. } => Ok(model.predict(rows)),
            #[cfg(feature = "xgboost")]
            FittedModel::XGBoost(model) => model.predict(rows),
            #[cfg(feature = "leafwise")]
            FittedModel::LightGbm(model) => model.predict(rows),
        }
    }

    fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Linear(_) => ModelFamily::LinearRegression,
            FittedModel::Forest(_) => ModelFamily::RandomForest,
            FittedModel::Boosted { family, .. } => *family,
            #[cfg(feature = "xgboost")]
            FittedModel::XGBoost(_) => ModelFamily::XGBoostLike,
            #[cfg(feature = "leafwise")]
            FittedModel::LightGbm(_) => ModelFamily::LightGBMLike,
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            FittedModel::Linear(_) => None,
            FittedModel::Forest(model) => model.feature_importances().map(<[f64]>::to_vec),
            FittedModel::Boosted { model, .. } => Some(model.feature_importances().to_vec()),
            #[cfg(feature = "xgboost")]
            FittedModel::XGBoost(model) => model.feature_importances().map(<[f64]>::to_vec),
            #[cfg(feature = "leafwise")]
            FittedModel::LightGbm(model) => Some(model.feature_importances().to_vec()),
        }
    }
}

/// A trained model with its held-out metrics
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub model: FittedModel,
    pub metrics: RegressionMetrics,
}

impl ModelEntry {
    pub fn new(model: FittedModel, metrics: RegressionMetrics) -> Self {
        Self {
            name: model.family().to_string(),
            model,
            metrics,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SalesMlError;
    use crate::ml::Capabilities;

    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y = rows.iter().map(|r| 5.0 * r[0] + r[1]).collect();
        (rows, y)
    }

    #[test]
    fn test_fit_every_available_family() {
        let (rows, y) = data();
        let settings = FitSettings {
            n_estimators: 10,
            seed: 42,
        };
        for family in Capabilities::probe().families() {
            let model = FittedModel::fit(family, &rows, &y, settings).unwrap();
            assert_eq!(model.family(), family);
            assert_eq!(model.predict(&rows).unwrap().len(), rows.len());
        }
    }

    #[cfg(not(feature = "leafwise"))]
    #[test]
    fn test_lightgbm_needs_feature() {
        let (rows, y) = data();
        assert!(matches!(
            FittedModel::fit(ModelFamily::LightGBMLike, &rows, &y, FitSettings::default()),
            Err(SalesMlError::FamilyUnavailable(ModelFamily::LightGBMLike))
        ));
    }

    #[test]
    fn test_linear_has_no_importances() {
        let (rows, y) = data();
        let model =
            FittedModel::fit(ModelFamily::LinearRegression, &rows, &y, FitSettings::default())
                .unwrap()
                .with_importances(&rows, &y)
                .unwrap();
        assert!(model.feature_importances().is_none());
    }

    #[test]
    fn test_forest_importances_after_request() {
        let (rows, y) = data();
        let settings = FitSettings {
            n_estimators: 10,
            seed: 42,
        };
        let model = FittedModel::fit(ModelFamily::RandomForest, &rows, &y, settings).unwrap();
        assert!(model.feature_importances().is_none());
        let model = model.with_importances(&rows, &y).unwrap();
        assert_eq!(model.feature_importances().unwrap().len(), 2);
    }

    #[test]
    fn test_entry_named_after_family() {
        let (rows, y) = data();
        let model =
            FittedModel::fit(ModelFamily::XGBoostLike, &rows, &y, FitSettings::default()).unwrap();
        let entry = ModelEntry::new(model, RegressionMetrics::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(entry.name, "XGBoost");
        assert_eq!(entry.named("custom").name, "custom");
    }
}
