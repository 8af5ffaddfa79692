//! Regression evaluation metrics

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::RegressionMetrics;
use crate::error::{Result, SalesMlError};

/// Compute MSE, RMSE, MAE and R² of `predicted` against `actual`
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<RegressionMetrics> {
    if actual.len() != predicted.len() {
        return Err(SalesMlError::ShapeMismatch {
            expected: actual.len(),
            actual: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(SalesMlError::InsufficientData(
            "no predictions to evaluate".to_string(),
        ));
    }

    let mse = mean_squared_error(actual, predicted);
    Ok(RegressionMetrics::new(
        mse,
        mse.sqrt(),
        mean_absolute_error(actual, predicted),
        r2_score(actual, predicted),
    ))
}

/// Importance of each of `n_features` columns for a fitted `predict`
///
/// Each feature column is shuffled once with a fixed seed; its importance is the
/// rise in MSE (floored at zero), normalized to sum to 1.
pub fn permutation_importance<F>(
    rows: &[Vec<f64>],
    y: &[f64],
    n_features: usize,
    seed: u64,
    predict: F,
) -> Result<Vec<f64>>
where
    F: Fn(&[Vec<f64>]) -> Result<Vec<f64>>,
{
    let baseline = mean_squared_error(y, &predict(rows)?);
    let mut rises = Vec::with_capacity(n_features);
    for feature in 0..n_features {
        let mut column: Vec<f64> = rows.iter().map(|r| r[feature]).collect();
        let mut rng = StdRng::seed_from_u64(seed + feature as u64);
        column.shuffle(&mut rng);
        let permuted: Vec<Vec<f64>> = rows
            .iter()
            .zip(&column)
            .map(|(row, value)| {
                let mut row = row.clone();
                row[feature] = *value;
                row
            })
            .collect();
        let mse = mean_squared_error(y, &predict(&permuted)?);
        rises.push((mse - baseline).max(0.0));
    }

    let total: f64 = rises.iter().sum();
    if total > 0.0 {
        rises.iter_mut().for_each(|r| *r /= total);
    }
    Ok(rises)
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n
}

/// Coefficient of determination; 0 when `actual` has no variance
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot.abs() < 1e-12 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}
