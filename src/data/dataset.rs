//! Model dataset extraction
//!
//! Selects the fixed, ordered feature columns that are present in a prepared
//! frame plus the target column.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::columns::{DEFAULT_TARGET, FEATURE_COLUMNS};
use super::frame::SalesFrame;
use crate::error::{Result, SalesMlError};
use crate::ml::FeatureMatrix;

/// Feature matrix and aligned target vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub features: FeatureMatrix,
    pub target: Vec<f64>,
}

impl ModelData {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Build features and target from a prepared frame. Rows with a null target
    /// are dropped before feature imputation.
    pub fn from_frame(frame: &SalesFrame, target: &str) -> Result<Self> {
        let Some(target_values) = frame.numeric(target) else {
            return Err(SalesMlError::InsufficientData(format!(
                "target column '{target}' is not present"
            )));
        };

        let names = available_features(frame);
        if names.is_empty() {
            warn!("no valid feature columns found");
            return Err(SalesMlError::InsufficientData(
                "no valid feature columns found".to_string(),
            ));
        }

        let keep: Vec<bool> = target_values
            .iter()
            .map(|v| v.map_or(false, f64::is_finite))
            .collect();
        let values: Vec<f64> = target_values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return Err(SalesMlError::InsufficientData(format!(
                "target column '{target}' has no values"
            )));
        }

        let rows = frame.filter_rows(&keep);
        let features = feature_matrix(&rows, &names)?;
        debug!(
            rows = features.n_rows(),
            features = features.n_features(),
            "model data prepared"
        );
        Ok(Self {
            features,
            target: values,
        })
    }

    /// Model data for the default `TOTAL_PROFIT` target
    pub fn profit(frame: &SalesFrame) -> Result<Self> {
        Self::from_frame(frame, DEFAULT_TARGET)
    }
}

/// Feature columns from the canonical list that exist as numeric columns
pub fn available_features(frame: &SalesFrame) -> Vec<String> {
    FEATURE_COLUMNS
        .iter()
        .filter(|name| frame.numeric(name).is_some())
        .map(|name| name.to_string())
        .collect()
}

/// Extract the named columns as a dense matrix. Null and non-finite cells are
/// replaced by the column mean of the finite values (0 when there are none).
pub fn feature_matrix(frame: &SalesFrame, names: &[String]) -> Result<FeatureMatrix> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| frame.numeric(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SalesMlError::MissingRequiredColumns { missing });
    }

    let columns: Vec<Vec<f64>> = names
        .iter()
        .filter_map(|name| frame.numeric(name))
        .map(impute_with_mean)
        .collect();

    let rows = (0..frame.n_rows())
        .map(|row| columns.iter().map(|column| column[row]).collect())
        .collect();
    FeatureMatrix::new(rows, names.to_vec())
}

/// Mean of the finite values of each named column
pub fn column_means(frame: &SalesFrame, names: &[String]) -> Result<Vec<f64>> {
    let matrix = feature_matrix(frame, names)?;
    Ok(matrix.column_means())
}

fn impute_with_mean(values: &[Option<f64>]) -> Vec<f64> {
    let finite: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let mean = if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };
    values
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => *x,
            _ => mean,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns::*;
    use crate::data::frame::Column;

    fn prepared_like() -> SalesFrame {
        SalesFrame::from_columns(vec![
            Column::numeric(QUANTITY, vec![Some(10.0), Some(20.0), Some(30.0)]),
            Column::text(STATUS, vec![Some("Shipped".into()), None, None]),
            Column::numeric(PRICE_EACH, vec![Some(5.0), None, Some(7.0)]),
            Column::numeric(TOTAL_PROFIT, vec![Some(1.0), Some(2.0), None]),
            Column::numeric("ORDERNUMBER", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_feature_order_follows_canonical_list() {
        let data = ModelData::profit(&prepared_like()).unwrap();
        assert_eq!(
            data.features.feature_names(),
            &[QUANTITY.to_string(), PRICE_EACH.to_string()]
        );
    }

    #[test]
    fn test_null_target_rows_dropped_and_features_imputed() {
        let data = ModelData::profit(&prepared_like()).unwrap();
        assert_eq!(data.target, vec![1.0, 2.0]);
        assert_eq!(data.features.n_rows(), 2);
        // the remaining price column only has 5.0 as a finite value
        assert_eq!(data.features.rows()[1], vec![20.0, 5.0]);
    }

    #[test]
    fn test_absent_target_is_insufficient_data() {
        let err = ModelData::from_frame(&prepared_like(), "NOT_THERE").unwrap_err();
        assert!(matches!(err, SalesMlError::InsufficientData(_)));
    }

    #[test]
    fn test_feature_matrix_reports_missing_columns() {
        let err = feature_matrix(&prepared_like(), &[MSRP.to_string()]).unwrap_err();
        assert!(matches!(err, SalesMlError::MissingRequiredColumns { .. }));
    }
}
