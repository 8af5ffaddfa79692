//! Ordinary least squares with intercept
//!
//! Solved on centered data through an SVD so rank-deficient designs (constant or
//! duplicated columns) get the minimum-norm solution.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::ModelFamily;
use crate::error::{Result, SalesMlError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn fit(rows: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if rows.len() != y.len() {
            return Err(SalesMlError::ShapeMismatch {
                expected: rows.len(),
                actual: y.len(),
            });
        }
        let Some(first) = rows.first() else {
            return Err(SalesMlError::InsufficientData(
                "cannot fit a linear model on zero rows".to_string(),
            ));
        };
        let (n, p) = (rows.len(), first.len());

        let x_means: Vec<f64> = (0..p)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        if p == 0 {
            return Ok(Self {
                coefficients: Vec::new(),
                intercept: y_mean,
            });
        }

        let centered: Vec<f64> = rows
            .iter()
            .flat_map(|r| r.iter().zip(&x_means).map(|(x, m)| x - m))
            .collect();
        let x = DMatrix::from_row_slice(n, p, &centered);
        let y_c = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));

        let svd = x.svd(true, true);
        let eps = svd.singular_values.max() * n.max(p) as f64 * f64::EPSILON;
        let beta = svd
            .solve(&y_c, eps)
            .map_err(|e| SalesMlError::training(ModelFamily::LinearRegression, e))?;

        let coefficients: Vec<f64> = beta.iter().copied().collect();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(SalesMlError::training(
                ModelFamily::LinearRegression,
                "least squares produced non-finite coefficients",
            ));
        }
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_means)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, c)| x * c)
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }
}
