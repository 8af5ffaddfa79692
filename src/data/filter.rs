//! Row filtering by order date range and categorical allow-lists

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::columns::{CUSTOMER_SEGMENT, DEAL_SIZE, ORDER_DATE, PRODUCT_LINE, STATUS, TERRITORY};
use super::frame::SalesFrame;

/// Dataset selection
///
/// Bounds are inclusive. An empty allow-list accepts every row; a non-empty one
/// rejects rows whose value is null or not listed. A date bound rejects rows
/// without an order date.
///
/// A criterion whose column is absent from the frame is ignored (and logged),
/// the same way the engineer skips features it cannot derive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub product_lines: Vec<String>,
    pub territories: Vec<String>,
    pub deal_sizes: Vec<String>,
    pub statuses: Vec<String>,
    pub customer_segments: Vec<String>,
}

impl DatasetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn product_lines<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.product_lines = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn territories<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.territories = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn deal_sizes<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.deal_sizes = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn statuses<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.statuses = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn customer_segments<S: Into<String>>(
        mut self,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.customer_segments = values.into_iter().map(Into::into).collect();
        self
    }

    /// Per-row keep mask
    pub fn mask(&self, frame: &SalesFrame) -> Vec<bool> {
        let dates = frame.dates(ORDER_DATE);
        let bounded = self.start.is_some() || self.end.is_some();
        if bounded && dates.is_none() {
            warn!(column = ORDER_DATE, "date bounds ignored, column absent");
        }

        let categorical: Vec<(&str, &Vec<String>)> = [
            (PRODUCT_LINE, &self.product_lines),
            (TERRITORY, &self.territories),
            (DEAL_SIZE, &self.deal_sizes),
            (STATUS, &self.statuses),
            (CUSTOMER_SEGMENT, &self.customer_segments),
        ]
        .into_iter()
        .filter(|(column, allowed)| {
            if allowed.is_empty() {
                return false;
            }
            let present = frame.has_column(column);
            if !present {
                warn!(%column, "allow-list ignored, column absent");
            }
            present
        })
        .collect();

        (0..frame.n_rows())
            .map(|row| {
                let in_range = match (dates, self.start, self.end) {
                    (None, _, _) | (_, None, None) => true,
                    (Some(dates), start, end) => dates[row].map_or(false, |d| {
                        start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
                    }),
                };
                in_range
                    && categorical.iter().all(|(column, allowed)| {
                        frame
                            .cell_label(column, row)
                            .map_or(false, |value| allowed.contains(&value))
                    })
            })
            .collect()
    }

    pub fn apply(&self, frame: &SalesFrame) -> SalesFrame {
        let mask = self.mask(frame);
        let filtered = frame.filter_rows(&mask);
        debug!(
            rows_in = frame.n_rows(),
            rows_out = filtered.n_rows(),
            "dataset filter applied"
        );
        filtered
    }
}
