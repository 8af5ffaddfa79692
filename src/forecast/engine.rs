use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calendar::month_ends_after;
use super::Predictor;
use crate::data::columns::{
    DAY, DAY_OF_WEEK, MONTH, MONTH_ID, ORDER_DATE, QTR_ID, QUARTER, YEAR, YEAR_ID,
};
use crate::data::dataset::column_means;
use crate::data::features::CalendarFields;
use crate::data::frame::SalesFrame;
use crate::error::{Result, SalesMlError};

/// One forecast month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub quarter: u32,
    pub predicted_value: f64,
}

/// Forecasts monthly values by predicting an "average" row re-dated to each
/// future month end
pub struct ForecastEngine<'a, P: Predictor + ?Sized> {
    predictor: &'a P,
}

impl<'a, P: Predictor + ?Sized> ForecastEngine<'a, P> {
    pub fn new(predictor: &'a P) -> Self {
        Self { predictor }
    }

    pub fn forecast(&self, history: &SalesFrame, periods_ahead: usize) -> Result<Vec<ForecastPoint>> {
        let names = self.predictor.feature_names()?;
        let latest = history
            .dates(ORDER_DATE)
            .and_then(|dates| dates.iter().flatten().max().copied())
            .ok_or_else(|| {
                SalesMlError::InsufficientData("history has no order dates".to_string())
            })?;
        let means = column_means(history, names)?;
        debug!(%latest, periods_ahead, "forecasting from latest order date");

        month_ends_after(latest, periods_ahead)
            .into_iter()
            .map(|date| {
                let fields = CalendarFields::from_date(date);
                let row = dated_row(&means, names, &fields);
                let predicted_value =
                    self.predictor.predict(&[row])?.first().copied().ok_or_else(|| {
                        SalesMlError::InsufficientData("predictor returned no value".to_string())
                    })?;
                Ok(ForecastPoint {
                    date,
                    year: fields.year,
                    month: fields.month,
                    quarter: fields.quarter,
                    predicted_value,
                })
            })
            .collect()
    }
}

/// Copy of `means` with the calendar columns set from `fields`
fn dated_row(means: &[f64], names: &[String], fields: &CalendarFields) -> Vec<f64> {
    let mut row = means.to_vec();
    for (value, name) in row.iter_mut().zip(names) {
        let replacement = match name.as_str() {
            YEAR | YEAR_ID => Some(fields.year as f64),
            MONTH | MONTH_ID => Some(fields.month as f64),
            DAY => Some(fields.day as f64),
            DAY_OF_WEEK => Some(fields.day_of_week as f64),
            QUARTER | QTR_ID => Some(fields.quarter as f64),
            _ => None,
        };
        if let Some(v) = replacement {
            *value = v;
        }
    }
    row
}
