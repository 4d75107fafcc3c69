//! Swappable regression estimators.
//!
//! The pipeline only relies on [`Regressor`]; any estimator that can be fit on
//! a dense feature matrix and predict one value per row fits the contract.

pub mod forest;
pub mod linear;

use std::fmt;
use std::str::FromStr;

use super::error::LagcastError;

pub use forest::{ForestConfig, RandomForestRegressor};
pub use linear::LinearRegression;

pub trait Regressor: Send {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), LagcastError>;

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, LagcastError>;

    fn predict_one(&self, row: &[f64]) -> Result<f64, LagcastError> {
        let out = self.predict(&[row.to_vec()])?;
        out.into_iter().next().ok_or_else(|| LagcastError::Training {
            symbol: String::new(),
            reason: "estimator returned no prediction".into(),
        })
    }

    fn name(&self) -> &str;
}

/// Builds a fresh, untrained estimator for one symbol.
pub trait ModelFactory: Sync {
    fn build(&self, seed: u64) -> Box<dyn Regressor>;
}

impl<F> ModelFactory for F
where
    F: Fn(u64) -> Box<dyn Regressor> + Sync,
{
    fn build(&self, seed: u64) -> Box<dyn Regressor> {
        self(seed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    RandomForest,
    Linear,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorKind::RandomForest => write!(f, "random_forest"),
            EstimatorKind::Linear => write!(f, "linear"),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random_forest" | "forest" | "rf" => Ok(EstimatorKind::RandomForest),
            "linear" | "ols" => Ok(EstimatorKind::Linear),
            other => Err(format!(
                "unknown estimator '{other}', expected random_forest or linear"
            )),
        }
    }
}

/// Estimator selection plus its hyperparameters, read from `[model]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub kind: EstimatorKind,
    pub forest: ForestConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            kind: EstimatorKind::RandomForest,
            forest: ForestConfig::default(),
        }
    }
}

impl ModelFactory for EstimatorConfig {
    fn build(&self, seed: u64) -> Box<dyn Regressor> {
        match self.kind {
            EstimatorKind::RandomForest => Box::new(RandomForestRegressor::new(ForestConfig {
                seed,
                ..self.forest.clone()
            })),
            EstimatorKind::Linear => Box::new(LinearRegression::new()),
        }
    }
}

pub(crate) fn check_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, LagcastError> {
    if x.is_empty() {
        return Err(training_error("empty training set"));
    }
    if x.len() != y.len() {
        return Err(training_error(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(training_error("feature rows have no columns"));
    }
    for row in x {
        if row.len() != width {
            return Err(training_error("ragged feature matrix"));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(training_error("non-finite feature value"));
        }
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(training_error("non-finite target value"));
    }
    Ok(width)
}

pub(crate) fn training_error(reason: impl Into<String>) -> LagcastError {
    LagcastError::Training {
        symbol: String::new(),
        reason: reason.into(),
    }
}
