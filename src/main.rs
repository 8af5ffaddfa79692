use anyhow::{Context, Result};
use sales_profit_predictor::config::Config;
use sales_profit_predictor::data::summary::Kpis;
use sales_profit_predictor::data::{self, FeatureEngineer, ModelData, PrepareReport};
use sales_profit_predictor::forecast::ForecastPoint;
use sales_profit_predictor::ml::inference::{FeatureImportance, ModelManager};
use sales_profit_predictor::ml::training::{ModelPerformance, TrainingResult};
use sales_profit_predictor::telemetry::init_tracing;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct RunReport {
    rows_loaded: usize,
    preparation: PrepareReport,
    kpis: Kpis,
    training: TrainingResult,
    comparison: Vec<ModelPerformance>,
    feature_importance: Option<Vec<FeatureImportance>>,
    tuned: Option<ModelPerformance>,
    forecast: Vec<ForecastPoint>,
    artifact_id: Uuid,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load().context("loading configuration")?;

    let raw = data::load_csv(&cfg.data.path, &cfg.data.encodings)
        .with_context(|| format!("loading {}", cfg.data.path.display()))?;
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw)?;
    let kpis = Kpis::from_frame(&prepared.frame);

    let model_data = ModelData::from_frame(&prepared.frame, &cfg.data.target)?;
    let mut manager = ModelManager::new(&cfg);
    let training = manager.train(&model_data.features, &model_data.target)?;
    let comparison = manager.model_comparison();
    let feature_importance = manager.feature_importance(model_data.features.feature_names())?;
    if feature_importance.is_none() {
        info!(model = %training.best_model, "best model has no feature importances");
    }

    let tuned = if cfg.tuning.enabled {
        let entry = manager.tune(
            &model_data.features,
            &model_data.target,
            &cfg.tuning.model_choice,
        )?;
        if entry.is_none() {
            warn!(choice = %cfg.tuning.model_choice, "tuning produced no model");
        }
        entry.map(|e| ModelPerformance::from(e.as_ref()))
    } else {
        None
    };

    let forecast = manager.forecast_default(&prepared.frame)?;
    let artifact_id = manager
        .save(&cfg.artifact.path)
        .with_context(|| format!("saving {}", cfg.artifact.path.display()))?;

    let report = RunReport {
        rows_loaded: raw.n_rows(),
        preparation: prepared.report,
        kpis,
        training,
        comparison,
        feature_importance,
        tuned,
        forecast,
        artifact_id,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("pipeline complete");
    Ok(())
}
