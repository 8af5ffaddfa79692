//! Zero-mean, unit-variance feature standardization

use serde::{Deserialize, Serialize};

use crate::error::{Result, SalesMlError};

/// Per-column mean and population standard deviation learned from training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Learn column statistics. Columns without variance keep a scale of 1.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(SalesMlError::InsufficientData(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        };
        let width = first.len();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(SalesMlError::ShapeMismatch {
                expected: width,
                actual: row.len(),
            });
        }

        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales = means
            .iter()
            .enumerate()
            .map(|(j, mean)| {
                let var = rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std.is_finite() && std > 1e-12 * mean.abs().max(1.0) {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { means, scales })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
