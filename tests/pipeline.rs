//! End-to-end pipeline: CSV file -> features -> training -> forecast -> artifact

use std::io::Write;

use sales_profit_predictor::config::Config;
use sales_profit_predictor::data::columns::{QUANTITY, TOTAL_PROFIT};
use sales_profit_predictor::data::summary::Kpis;
use sales_profit_predictor::data::{load_csv, DatasetFilter, FeatureEngineer, ModelData};
use sales_profit_predictor::ml::inference::ModelManager;
use sales_profit_predictor::ml::tuning::TUNED_FOREST_NAME;
use sales_profit_predictor::ml::{Capabilities, ModelFamily};
use sales_profit_predictor::SalesMlError;
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "ORDERNUMBER,QUANTITYORDERED,PRICEEACH,ORDERLINENUMBER,SALES,ORDERDATE,\
STATUS,QTR_ID,MONTH_ID,YEAR_ID,PRODUCTLINE,MSRP,CUSTOMERNAME,TERRITORY,DEALSIZE";

const PRODUCT_LINES: [&str; 3] = ["Classic Cars", "Motorcycles", "Ships"];
const TERRITORIES: [&str; 3] = ["EMEA", "NA", "APAC"];
const STATUSES: [&str; 2] = ["Shipped", "Resolved"];

/// One CSV line; `quantity: None` leaves the cell empty
fn record(i: usize, quantity: Option<u32>) -> String {
    let month = i % 11 + 1;
    let price = 40.0 + (i % 7) as f64 * 9.5;
    let qty = quantity.map(f64::from).unwrap_or(30.0);
    let sales = qty * price;
    let deal = if sales < 1000.0 {
        "Small"
    } else if sales <= 5000.0 {
        "Medium"
    } else {
        "Large"
    };
    format!(
        "{},{},{:.2},{},{:.2},{:02}/{:02}/2004 00:00,{},{},{},2004,{},{:.0},Customer {},{},{}",
        10100 + i,
        quantity.map(|q| q.to_string()).unwrap_or_default(),
        price,
        i % 5 + 1,
        sales,
        month,
        i % 27 + 1,
        STATUSES[i % 2],
        (month - 1) / 3 + 1,
        month,
        PRODUCT_LINES[i % 3],
        price * 1.2,
        i % 9,
        TERRITORIES[i % 3],
        deal,
    )
}

fn write_csv(lines: impl IntoIterator<Item = String>) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "{HEADER}").expect("header");
    for line in lines {
        writeln!(file, "{line}").expect("record");
    }
    file
}

fn config() -> Config {
    let mut config = Config::default();
    config.training.n_estimators = 20;
    config.tuning.tree_counts = vec![10, 20];
    config.tuning.max_depths = vec![0, 6];
    config
}

fn sample_csv(n: usize) -> NamedTempFile {
    write_csv((0..n).map(|i| record(i, Some(10 + (i % 40) as u32))))
}

#[test]
fn test_null_quantities_are_dropped() {
    let lines = (0..10).map(|i| {
        let quantity = if i == 3 || i == 7 { None } else { Some(20 + i as u32) };
        record(i, quantity)
    });
    let file = write_csv(lines);
    let cfg = config();

    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    assert_eq!(raw.n_rows(), 10);
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();

    assert_eq!(prepared.report.rows_in, 10);
    assert_eq!(prepared.frame.n_rows(), 8);
    assert!(prepared
        .frame
        .numeric(QUANTITY)
        .unwrap()
        .iter()
        .all(Option::is_some));
}

#[test]
fn test_full_pipeline() {
    let file = sample_csv(60);
    let cfg = config();

    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();
    let kpis = Kpis::from_frame(&prepared.frame);
    assert_eq!(kpis.total_orders, 60);
    assert!(kpis.total_profit > 0.0);

    let data = ModelData::from_frame(&prepared.frame, TOTAL_PROFIT).unwrap();
    let families = Capabilities::probe().families().len();
    let mut manager = ModelManager::new(&cfg).with_capabilities(Capabilities::probe());
    let result = manager.train(&data.features, &data.target).unwrap();

    assert_eq!(result.performances.len(), families);
    assert!(result.performances.iter().all(|p| p.metrics.r2 <= 1.0));
    let best = result
        .performances
        .iter()
        .map(|p| p.metrics.r2)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(result.best_score, best);

    let comparison = manager.model_comparison();
    assert_eq!(comparison.len(), families);
    assert!(comparison.windows(2).all(|w| w[0].metrics.r2 >= w[1].metrics.r2));

    let predictions = manager.predict(data.features.rows()).unwrap();
    assert_eq!(predictions.len(), data.len());

    // latest order date is in November 2004
    let forecast = manager.forecast(&prepared.frame, 6).unwrap();
    let months: Vec<u32> = forecast.iter().map(|p| p.month).collect();
    assert_eq!(months, vec![12, 1, 2, 3, 4, 5]);
    assert!(forecast.iter().all(|p| p.predicted_value.is_finite()));
}

#[test]
fn test_leafwise_family_is_optional() {
    let file = sample_csv(40);
    let cfg = config();
    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();

    let mut manager = ModelManager::new(&cfg).with_capabilities(Capabilities { leafwise: false });
    let result = manager.train_frame(&prepared.frame, TOTAL_PROFIT).unwrap();

    assert_eq!(result.performances.len(), 4);
    assert!(result
        .performances
        .iter()
        .all(|p| p.family != ModelFamily::LightGBMLike));
}

#[test]
fn test_predict_before_training() {
    let manager = ModelManager::new(&config());
    assert!(matches!(
        manager.predict(&[vec![1.0, 2.0]]),
        Err(SalesMlError::NoActiveModel)
    ));
}

#[test]
fn test_tuning_choices() {
    let file = sample_csv(45);
    let cfg = config();
    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();
    let data = ModelData::from_frame(&prepared.frame, TOTAL_PROFIT).unwrap();

    let mut manager = ModelManager::new(&cfg);
    let result = manager.train(&data.features, &data.target).unwrap();

    let skipped = manager
        .tune(&data.features, &data.target, "Logistic Regression")
        .unwrap();
    assert!(skipped.is_none());
    assert_eq!(manager.active().unwrap().name(), result.best_model);

    let tuned = manager
        .tune(&data.features, &data.target, "Random Forest")
        .unwrap()
        .unwrap();
    assert_eq!(tuned.name, TUNED_FOREST_NAME);
    assert_eq!(manager.active().unwrap().name(), TUNED_FOREST_NAME);
    assert_eq!(manager.entries().len(), result.performances.len() + 1);
}

#[test]
fn test_artifact_round_trip() {
    let file = sample_csv(40);
    let cfg = config();
    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();

    let mut manager = ModelManager::new(&cfg);
    manager.train_frame(&prepared.frame, TOTAL_PROFIT).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("best_model.bin");
    manager.save(&path).unwrap();

    let mut restored = ModelManager::new(&cfg);
    restored.load(&path).unwrap();
    assert_eq!(
        restored.predict_frame(&prepared.frame).unwrap(),
        manager.predict_frame(&prepared.frame).unwrap()
    );
}

#[test]
fn test_tuned_forest_artifact_round_trip() {
    let file = sample_csv(40);
    let cfg = config();
    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();
    let data = ModelData::from_frame(&prepared.frame, TOTAL_PROFIT).unwrap();

    let mut manager = ModelManager::new(&cfg);
    manager.train(&data.features, &data.target).unwrap();
    manager
        .tune(&data.features, &data.target, "Random Forest")
        .unwrap()
        .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("tuned.bin");
    manager.save(&path).unwrap();

    let mut restored = ModelManager::new(&cfg);
    restored.load(&path).unwrap();
    assert_eq!(restored.active().unwrap().name(), TUNED_FOREST_NAME);
    assert_eq!(
        restored.predict_frame(&prepared.frame).unwrap(),
        manager.predict_frame(&prepared.frame).unwrap()
    );
}

#[test]
fn test_filtered_frame_feeds_kpis() {
    let file = sample_csv(30);
    let cfg = config();
    let raw = load_csv(file.path(), &cfg.data.encodings).unwrap();
    let prepared = FeatureEngineer::new(cfg.features.clone()).prepare(&raw).unwrap();

    let ships = DatasetFilter::new().product_lines(["Ships"]).apply(&prepared.frame);
    assert_eq!(Kpis::from_frame(&ships).total_orders, 10);

    let nothing = DatasetFilter::new().territories(["Nowhere"]).apply(&prepared.frame);
    assert_eq!(Kpis::from_frame(&nothing).total_orders, 0);
}
