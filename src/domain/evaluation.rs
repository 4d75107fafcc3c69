//! Regression accuracy metrics for one-step-ahead forecasts.
//!
//! MAPE and SMAPE skip points whose denominator is zero. If every point is
//! skipped the metric is undefined and reported as such rather than as zero.

use super::error::{LagcastError, UndefinedMetric};

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: Option<f64>,
    /// Percent.
    pub mape: Option<f64>,
    /// Percent.
    pub smape: Option<f64>,
    pub n_samples: usize,
}

pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics, LagcastError> {
    check_lengths(y_true, y_pred)?;

    let mse = mean_squared_error(y_true, y_pred);
    Ok(RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        mae: mean_absolute_error(y_true, y_pred),
        r2: r_squared(y_true, y_pred).ok(),
        mape: mean_absolute_percentage_error(y_true, y_pred).ok(),
        smape: symmetric_mean_absolute_percentage_error(y_true, y_pred).ok(),
        n_samples: y_true.len(),
    })
}

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<(), LagcastError> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(LagcastError::Training {
            symbol: String::new(),
            reason: format!(
                "cannot evaluate {} predictions against {} actuals",
                y_pred.len(),
                y_true.len()
            ),
        });
    }
    Ok(())
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// R² = 1 - SS_res / SS_tot. Undefined for a constant `y_true`.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> Result<f64, UndefinedMetric> {
    if y_true.is_empty() {
        return Err(UndefinedMetric::new("r2", "no samples"));
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err(UndefinedMetric::new("r2", "actual values have zero variance"));
    }
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    Ok(1.0 - ss_res / ss_tot)
}

/// mean(|t - p| / |t|) × 100 over points with `t != 0`.
pub fn mean_absolute_percentage_error(
    y_true: &[f64],
    y_pred: &[f64],
) -> Result<f64, UndefinedMetric> {
    let terms: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, _)| **t != 0.0)
        .map(|(t, p)| (t - p).abs() / t.abs())
        .collect();
    mean_percent(&terms, "mape", "every actual value is zero")
}

/// mean(2|p - t| / (|t| + |p|)) × 100 over points where `|t| + |p| != 0`.
pub fn symmetric_mean_absolute_percentage_error(
    y_true: &[f64],
    y_pred: &[f64],
) -> Result<f64, UndefinedMetric> {
    let terms: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.abs() + p.abs() != 0.0)
        .map(|(t, p)| 2.0 * (p - t).abs() / (t.abs() + p.abs()))
        .collect();
    mean_percent(&terms, "smape", "every actual and predicted pair is zero")
}

fn mean_percent(terms: &[f64], metric: &'static str, reason: &str) -> Result<f64, UndefinedMetric> {
    if terms.is_empty() {
        return Err(UndefinedMetric::new(metric, reason));
    }
    Ok(terms.iter().sum::<f64>() / terms.len() as f64 * 100.0)
}
