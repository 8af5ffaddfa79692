//! Monthly forecasting on top of a fitted predictor

pub mod calendar;
pub mod engine;

pub use calendar::*;
pub use engine::*;

use crate::error::Result;

/// Anything that maps feature rows with known column names to predictions
pub trait Predictor {
    /// Columns each row must supply, in order
    fn feature_names(&self) -> Result<&[String]>;

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;
}
