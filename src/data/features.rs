//! Feature engineering for sales records
//!
//! Derives profit, customer segment, ordinal codes, calendar fields and ratio
//! features from a raw sales frame. Every derivation is conditional on its
//! prerequisite columns being present and on the derived column being absent,
//! so running the engineer on its own output is a no-op.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

use super::columns::*;
use super::frame::{Column, SalesFrame};
use crate::config::FeatureConfig;
use crate::error::{Result, SalesMlError};

/// Customer bucket derived from the sale amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum CustomerSegment {
    Small,
    Medium,
    Large,
}

impl CustomerSegment {
    /// Bucket a sale amount; buckets are lower-exclusive and upper-inclusive.
    /// Amounts at or below zero have no segment.
    pub fn from_sales(amount: f64, config: &FeatureConfig) -> Option<Self> {
        if amount.is_nan() || amount <= 0.0 {
            None
        } else if amount <= config.small_segment_max {
            Some(CustomerSegment::Small)
        } else if amount <= config.medium_segment_max {
            Some(CustomerSegment::Medium)
        } else {
            Some(CustomerSegment::Large)
        }
    }
}

/// Ordinal code for a deal size label; unknown or missing sizes count as small
pub fn deal_size_code(label: Option<&str>) -> f64 {
    match label {
        Some("Medium") => 2.0,
        Some("Large") => 3.0,
        _ => 1.0,
    }
}

/// 1-based codes in first-seen row order
///
/// A missing value is a category of its own and takes the next code the first
/// time it appears, so every row gets a code.
pub fn first_seen_codes(values: &[Option<String>]) -> Vec<f64> {
    let mut seen: Vec<Option<&str>> = Vec::new();
    values
        .iter()
        .map(|value| {
            let value = value.as_deref();
            let idx = match seen.iter().position(|s| *s == value) {
                Some(idx) => idx,
                None => {
                    seen.push(value);
                    seen.len() - 1
                }
            };
            (idx + 1) as f64
        })
        .collect()
}

/// Calendar fields extracted from an order date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 0=Monday, 6=Sunday
    pub day_of_week: u32,
    pub quarter: u32,
}

impl CalendarFields {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month();
        Self {
            year: date.year(),
            month,
            day: date.day(),
            day_of_week: date.weekday().num_days_from_monday(),
            quarter: (month - 1) / 3 + 1,
        }
    }
}

/// Profit margin of the unit price against MSRP, in percent
pub fn profit_margin(price_each: Option<f64>, msrp: Option<f64>) -> Option<f64> {
    match msrp {
        Some(msrp) if msrp > 0.0 => price_each.map(|price| (price - msrp) / msrp * 100.0),
        _ => Some(0.0),
    }
}

/// Row counts and derived columns of one `prepare` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub derived_columns: Vec<String>,
}

impl PrepareReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub frame: SalesFrame,
    pub report: PrepareReport,
}

/// Turns raw sales rows into model-ready feature records
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Derive all features and drop rows without sales, quantity or price
    pub fn prepare(&self, raw: &SalesFrame) -> Result<Prepared> {
        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|name| !raw.has_column(name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SalesMlError::MissingRequiredColumns { missing });
        }

        let rows_in = raw.n_rows();
        let mut frame = raw.clone();
        for name in [SALES, QUANTITY, PRICE_EACH, MSRP] {
            frame.coerce_numeric(name);
        }

        let mut derived = Vec::new();
        let mut add = |frame: &mut SalesFrame, column: Column| -> Result<()> {
            debug!(column = %column.name, "derived column");
            derived.push(column.name.clone());
            frame.insert(column)
        };

        if !frame.has_column(TOTAL_PROFIT) {
            let column = self.total_profit(&frame);
            add(&mut frame, column)?;
        }
        if !frame.has_column(CUSTOMER_SEGMENT) {
            let column = self.customer_segment(&frame);
            add(&mut frame, column)?;
        }
        if !frame.has_column(DEAL_SIZE_NUMERIC) {
            if let Some(column) = deal_size_numeric(&frame) {
                add(&mut frame, column)?;
            }
        }
        if !frame.has_column(STATUS_NUMERIC) {
            if let Some(column) = categorical_codes(&frame, STATUS, STATUS_NUMERIC) {
                add(&mut frame, column)?;
            }
        }
        if !frame.has_column(TERRITORY_RANK) {
            if let Some(column) = categorical_codes(&frame, TERRITORY, TERRITORY_RANK) {
                add(&mut frame, column)?;
            }
        }
        for column in calendar_columns(&frame) {
            add(&mut frame, column)?;
        }
        if !frame.has_column(PROFIT_MARGIN) && frame.has_column(MSRP) {
            let column = profit_margin_column(&frame);
            add(&mut frame, column)?;
        }
        if !frame.has_column(TOTAL_QUANTITY) {
            let quantity = numeric_or_nulls(&frame, QUANTITY);
            add(&mut frame, Column::numeric(TOTAL_QUANTITY, quantity))?;
        }
        if !frame.has_column(AVG_SALES) {
            let column = avg_sales(&frame);
            add(&mut frame, column)?;
        }
        if !frame.has_column(ORDER_COUNT) {
            let ones = vec![Some(1.0); frame.n_rows()];
            add(&mut frame, Column::numeric(ORDER_COUNT, ones))?;
        }

        let keep: Vec<bool> = (0..frame.n_rows())
            .map(|row| {
                REQUIRED
                    .iter()
                    .all(|name| frame.column(name).map_or(false, |c| !c.data.is_null(row)))
            })
            .collect();
        frame.retain_rows(&keep);

        let report = PrepareReport {
            rows_in,
            rows_out: frame.n_rows(),
            derived_columns: derived,
        };
        info!(
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            columns = frame.n_columns(),
            "data preprocessed successfully"
        );
        Ok(Prepared { frame, report })
    }

    fn total_profit(&self, frame: &SalesFrame) -> Column {
        let sales = numeric_or_nulls(frame, SALES);
        let quantity = numeric_or_nulls(frame, QUANTITY);
        let price = numeric_or_nulls(frame, PRICE_EACH);
        let profit = sales
            .iter()
            .zip(quantity.iter().zip(&price))
            .map(|(s, (q, p))| Some(s.as_ref()? - q.as_ref()? * p.as_ref()? * self.config.cost_ratio))
            .collect();
        Column::numeric(TOTAL_PROFIT, profit)
    }

    fn customer_segment(&self, frame: &SalesFrame) -> Column {
        let segments = numeric_or_nulls(frame, SALES)
            .iter()
            .map(|s| {
                s.and_then(|amount| CustomerSegment::from_sales(amount, &self.config))
                    .map(|segment| segment.to_string())
            })
            .collect();
        Column::text(CUSTOMER_SEGMENT, segments)
    }
}

fn numeric_or_nulls(frame: &SalesFrame, name: &str) -> Vec<Option<f64>> {
    frame
        .numeric(name)
        .map(|v| v.to_vec())
        .unwrap_or_else(|| vec![None; frame.n_rows()])
}

fn text_values(frame: &SalesFrame, name: &str) -> Option<Vec<Option<String>>> {
    let column = frame.column(name)?;
    Some(
        (0..frame.n_rows())
            .map(|row| {
                if column.data.is_null(row) {
                    None
                } else {
                    frame.cell_label(name, row)
                }
            })
            .collect(),
    )
}

fn deal_size_numeric(frame: &SalesFrame) -> Option<Column> {
    let labels = text_values(frame, DEAL_SIZE)?;
    let codes = labels
        .iter()
        .map(|label| Some(deal_size_code(label.as_deref())))
        .collect();
    Some(Column::numeric(DEAL_SIZE_NUMERIC, codes))
}

fn categorical_codes(frame: &SalesFrame, source: &str, target: &str) -> Option<Column> {
    let labels = text_values(frame, source)?;
    let codes = first_seen_codes(&labels).into_iter().map(Some).collect();
    Some(Column::numeric(target, codes))
}

fn calendar_columns(frame: &SalesFrame) -> Vec<Column> {
    let Some(dates) = frame.dates(ORDER_DATE) else {
        return Vec::new();
    };
    let fields: Vec<Option<CalendarFields>> =
        dates.iter().map(|d| d.map(CalendarFields::from_date)).collect();

    let extractors: [(&str, fn(&CalendarFields) -> f64); 5] = [
        (YEAR, |c: &CalendarFields| c.year as f64),
        (MONTH, |c: &CalendarFields| c.month as f64),
        (DAY, |c: &CalendarFields| c.day as f64),
        (DAY_OF_WEEK, |c: &CalendarFields| c.day_of_week as f64),
        (QUARTER, |c: &CalendarFields| c.quarter as f64),
    ];
    extractors
        .iter()
        .filter(|(name, _)| !frame.has_column(name))
        .map(|(name, extract)| {
            Column::numeric(*name, fields.iter().map(|f| f.as_ref().map(extract)).collect())
        })
        .collect()
}

fn profit_margin_column(frame: &SalesFrame) -> Column {
    let price = numeric_or_nulls(frame, PRICE_EACH);
    let msrp = numeric_or_nulls(frame, MSRP);
    let margin = price
        .iter()
        .zip(&msrp)
        .map(|(p, m)| profit_margin(*p, *m))
        .collect();
    Column::numeric(PROFIT_MARGIN, margin)
}

fn avg_sales(frame: &SalesFrame) -> Column {
    let sales = numeric_or_nulls(frame, SALES);
    let quantity = numeric_or_nulls(frame, QUANTITY);
    let avg = sales
        .iter()
        .zip(&quantity)
        .map(|(s, q)| match (s, q) {
            (Some(s), Some(q)) if *q != 0.0 => Some(s / q),
            _ => None,
        })
        .collect();
    Column::numeric(AVG_SALES, avg)
}
