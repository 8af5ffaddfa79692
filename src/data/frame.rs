//! Column-typed sales table
//!
//! A `SalesFrame` is an ordered list of named, nullable columns of equal length.
//! It is deliberately small: the pipeline only needs column lookup, column
//! insertion, row filtering and numeric coercion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SalesMlError};

/// Values stored in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Date(_) => ColumnKind::Date,
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v.get(row).map_or(true, |x| x.is_none()),
            ColumnData::Text(v) => v.get(row).map_or(true, |x| x.is_none()),
            ColumnData::Date(v) => v.get(row).map_or(true, |x| x.is_none()),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_null(row)).count()
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut idx = 0;
            values.retain(|_| {
                let kept = keep.get(idx).copied().unwrap_or(false);
                idx += 1;
                kept
            });
        }
        match self {
            ColumnData::Numeric(v) => filter(v, keep),
            ColumnData::Text(v) => filter(v, keep),
            ColumnData::Date(v) => filter(v, keep),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn date(name: impl Into<String>, values: Vec<Option<NaiveDate>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Date(values),
        }
    }
}

/// Ordered collection of equally sized columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesFrame {
    columns: Vec<Column>,
    n_rows: usize,
}

impl SalesFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from columns, rejecting ragged input
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::new();
        for column in columns {
            frame.insert(column)?;
        }
        Ok(frame)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric values of a column, `None` if absent or not numeric
    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        match &self.column(name)?.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn dates(&self, name: &str) -> Option<&[Option<NaiveDate>]> {
        match &self.column(name)?.data {
            ColumnData::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Render a cell of any kind as text, used for categorical grouping
    pub fn cell_label(&self, name: &str, row: usize) -> Option<String> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            ColumnData::Text(v) => v.get(row).cloned().flatten(),
            ColumnData::Date(v) => v.get(row).copied().flatten().map(|d| d.to_string()),
        }
    }

    /// Append a column, or replace an existing column with the same name
    pub fn insert(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.data.len() != self.n_rows {
            return Err(SalesMlError::ShapeMismatch {
                expected: self.n_rows,
                actual: column.data.len(),
            });
        }
        self.n_rows = column.data.len();
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Convert a text column to numeric in place; unparseable cells become null
    pub fn coerce_numeric(&mut self, name: &str) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == name) {
            if let ColumnData::Text(values) = &column.data {
                let parsed = values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                    .collect();
                column.data = ColumnData::Numeric(parsed);
            }
        }
    }

    /// Keep the rows whose mask entry is `true`
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.data.retain_rows(keep);
        }
        self.n_rows = keep.iter().take(self.n_rows).filter(|k| **k).count();
    }

    /// Copy of the frame restricted to the masked rows
    pub fn filter_rows(&self, keep: &[bool]) -> Self {
        let mut out = self.clone();
        out.retain_rows(keep);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SalesFrame {
        SalesFrame::from_columns(vec![
            Column::numeric("SALES", vec![Some(10.0), None, Some(30.0)]),
            Column::text(
                "STATUS",
                vec![Some("Shipped".into()), Some("Disputed".into()), None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_insert_rejects_ragged_column() {
        let mut frame = sample();
        let err = frame.insert(Column::numeric("X", vec![Some(1.0)]));
        assert!(err.is_err());
        assert_eq!(frame.n_columns(), 2);
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut frame = sample();
        frame
            .insert(Column::numeric("SALES", vec![Some(1.0), Some(2.0), Some(3.0)]))
            .unwrap();
        assert_eq!(frame.n_columns(), 2);
        assert_eq!(frame.numeric("SALES").unwrap()[1], Some(2.0));
    }

    #[test]
    fn test_retain_rows() {
        let mut frame = sample();
        frame.retain_rows(&[true, false, true]);
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.numeric("SALES").unwrap(), &[Some(10.0), Some(30.0)]);
        assert_eq!(frame.text("STATUS").unwrap()[1], None);
    }

    #[test]
    fn test_coerce_numeric() {
        let mut frame = SalesFrame::from_columns(vec![Column::text(
            "QUANTITYORDERED",
            vec![Some("12".into()), Some("abc".into()), None],
        )])
        .unwrap();
        frame.coerce_numeric("QUANTITYORDERED");
        assert_eq!(
            frame.numeric("QUANTITYORDERED").unwrap(),
            &[Some(12.0), None, None]
        );
    }

    #[test]
    fn test_null_count() {
        let frame = sample();
        assert_eq!(frame.column("SALES").unwrap().data.null_count(), 1);
        assert_eq!(frame.cell_label("STATUS", 0).as_deref(), Some("Shipped"));
    }
}
