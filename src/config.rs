use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

use crate::data::columns::DEFAULT_TARGET;
use crate::data::loader::DEFAULT_ENCODINGS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[validate(nested)]
    pub features: FeatureConfig,
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub tuning: TuningConfig,
    #[validate(nested)]
    pub forecast: ForecastConfig,
    pub artifact: ArtifactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub encodings: Vec<String>,
    #[validate(length(min = 1))]
    pub target: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sales_data_sample.csv"),
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

/// Constants used while deriving features
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_segment_edges"))]
pub struct FeatureConfig {
    /// Share of the list price treated as cost
    #[validate(range(min = 0.0, max = 1.0))]
    pub cost_ratio: f64,
    /// Upper edge (inclusive) of the Small segment
    #[validate(range(exclusive_min = 0.0))]
    pub small_segment_max: f64,
    /// Upper edge (inclusive) of the Medium segment
    #[validate(range(exclusive_min = 0.0))]
    pub medium_segment_max: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            cost_ratio: 0.7,
            small_segment_max: 1000.0,
            medium_segment_max: 5000.0,
        }
    }
}

/// Segment edges must be strictly increasing
fn validate_segment_edges(cfg: &FeatureConfig) -> std::result::Result<(), ValidationError> {
    if cfg.small_segment_max < cfg.medium_segment_max {
        Ok(())
    } else {
        let mut err = ValidationError::new("segment_edges");
        err.message = Some("small_segment_max must be below medium_segment_max".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_fraction: f64,
    pub seed: u64,
    #[validate(range(min = 1, max = 5000))]
    pub n_estimators: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            n_estimators: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TuningConfig {
    #[validate(range(min = 2, max = 20))]
    pub folds: usize,
    #[validate(length(min = 1))]
    pub tree_counts: Vec<usize>,
    /// Depth limits to search; 0 means unbounded
    #[validate(length(min = 1))]
    pub max_depths: Vec<u16>,
    /// Run the search as part of the batch pipeline
    pub enabled: bool,
    pub model_choice: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            folds: 3,
            tree_counts: vec![50, 100, 200],
            max_depths: vec![0, 10, 20],
            enabled: false,
            model_choice: "Random Forest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ForecastConfig {
    #[validate(range(min = 1, max = 120))]
    pub periods_ahead: usize,
    #[validate(range(exclusive_min = 0.0))]
    pub clv_lifetime_orders: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            periods_ahead: 6,
            clv_lifetime_orders: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("artifacts/best_model.bin"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("SALESML__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}
