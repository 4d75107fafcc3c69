//! One-symbol forecast pipeline: split, scale, train, predict, score.
//!
//! The scaler is fit on the training partition only and then frozen; the
//! holdout is transformed with those statistics and never refit.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use super::error::LagcastError;
use super::estimator::{ModelFactory, Regressor};
use super::evaluation::{RegressionMetrics, evaluate};
use super::features::{FeatureMatrix, FeatureRow, LagWindow, build_feature_matrix};
use super::price::PriceSeries;
use super::scaler::ScalerState;

/// How feature rows are divided into train and test partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// The last rows, in order, form the test set.
    #[default]
    Chronological,
    /// Rows are shuffled before splitting. Later prices leak into training,
    /// which inflates holdout accuracy; kept only for comparison runs.
    Random,
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMode::Chronological => write!(f, "chronological"),
            SplitMode::Random => write!(f, "random"),
        }
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chronological" | "time" => Ok(SplitMode::Chronological),
            "random" | "shuffle" => Ok(SplitMode::Random),
            other => Err(format!(
                "unknown split mode '{other}', expected chronological or random"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub lag_days: usize,
    pub test_fraction: f64,
    pub split_mode: SplitMode,
    pub forecast_periods: usize,
    pub estimator_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            lag_days: 5,
            test_fraction: 0.2,
            split_mode: SplitMode::Chronological,
            forecast_periods: 5,
            estimator_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
    /// Row positions in the source matrix, ascending.
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Holdout actual and predicted price for the same step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionPair {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub symbol: String,
    pub estimator: String,
    pub metrics: RegressionMetrics,
    /// Chronological holdout order.
    pub pairs: Vec<PredictionPair>,
    pub forecast: Vec<f64>,
    pub scaler: ScalerState,
    pub train_rows: usize,
    pub test_rows: usize,
}

fn test_size(n: usize, test_fraction: f64) -> usize {
    // guard against 0.1 * 30 = 3.0000000000000004 rounding up to 4
    ((test_fraction * n as f64) - 1e-9).ceil().max(0.0) as usize
}

/// Smallest row count that leaves at least one row on each side.
pub fn minimum_rows(test_fraction: f64) -> usize {
    (2..)
        .find(|&n| {
            let n_test = test_size(n, test_fraction);
            n_test >= 1 && n_test < n
        })
        .unwrap_or(2)
}

pub fn split(
    matrix: &FeatureMatrix,
    test_fraction: f64,
    mode: SplitMode,
    seed: u64,
) -> Result<TrainTestSplit, LagcastError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(LagcastError::invalid(
            "pipeline",
            "test_fraction",
            "test_fraction must be between 0 and 1 (exclusive)",
        ));
    }

    let n = matrix.len();
    let n_test = test_size(n, test_fraction);
    if n_test == 0 || n_test >= n {
        return Err(LagcastError::InsufficientData {
            symbol: matrix.symbol.clone(),
            rows: n,
            minimum: minimum_rows(test_fraction),
        });
    }

    let (mut train_indices, mut test_indices): (Vec<usize>, Vec<usize>) = match mode {
        SplitMode::Chronological => ((0..n - n_test).collect(), (n - n_test..n).collect()),
        SplitMode::Random => {
            warn!(
                symbol = %matrix.symbol,
                "random split mixes future rows into training; holdout scores are optimistic"
            );
            let mut order: Vec<usize> = (0..n).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            order.shuffle(&mut rng);
            let train = order.split_off(n_test);
            (train, order)
        }
    };
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    debug!(
        symbol = %matrix.symbol,
        mode = %mode,
        train = train_indices.len(),
        test = test_indices.len(),
        "split feature rows"
    );

    Ok(TrainTestSplit {
        train: train_indices.iter().map(|&i| matrix.rows[i].clone()).collect(),
        test: test_indices.iter().map(|&i| matrix.rows[i].clone()).collect(),
        train_indices,
        test_indices,
    })
}

fn features_and_targets(rows: &[FeatureRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.iter().map(|r| (r.lags.clone(), r.target)).unzip()
}

/// Build a fresh estimator and fit it on already-scaled features.
pub fn train(
    factory: &dyn ModelFactory,
    seed: u64,
    scaled_x: &[Vec<f64>],
    y: &[f64],
) -> Result<Box<dyn Regressor>, LagcastError> {
    let mut model = factory.build(seed);
    model.fit(scaled_x, y)?;
    Ok(model)
}

/// Roll the model forward `periods` steps, feeding each prediction back in as
/// the newest lag. Errors compound because later steps never see real prices.
pub fn forecast_multistep(
    model: &dyn Regressor,
    scaler: &ScalerState,
    window: &LagWindow,
    periods: usize,
) -> Result<Vec<f64>, LagcastError> {
    let mut window = window.clone();
    let mut forecast = Vec::with_capacity(periods);
    for _ in 0..periods {
        let scaled = scaler.transform_row(window.values())?;
        let next = model.predict_one(&scaled)?;
        forecast.push(next);
        window.push(next);
    }
    Ok(forecast)
}

pub fn run_pipeline(
    series: &PriceSeries,
    config: &PipelineConfig,
    factory: &dyn ModelFactory,
) -> Result<PipelineOutput, LagcastError> {
    let symbol = series.symbol();
    let matrix = build_feature_matrix(series, config.lag_days)?;
    let parts = split(
        &matrix,
        config.test_fraction,
        config.split_mode,
        config.estimator_seed,
    )?;

    let (train_x, train_y) = features_and_targets(&parts.train);
    let (test_x, test_y) = features_and_targets(&parts.test);

    let stage = || -> Result<PipelineOutput, LagcastError> {
        let scaler = ScalerState::fit(&train_x)?;
        let model = train(
            factory,
            config.estimator_seed,
            &scaler.transform(&train_x)?,
            &train_y,
        )?;
        let predicted = model.predict(&scaler.transform(&test_x)?)?;
        let metrics = evaluate(&test_y, &predicted)?;

        let pairs = parts
            .test
            .iter()
            .zip(&predicted)
            .map(|(row, &p)| PredictionPair {
                date: row.target_date,
                actual: row.target,
                predicted: p,
            })
            .collect();

        let forecast = if config.forecast_periods > 0 {
            let window = LagWindow::latest(series, config.lag_days)?;
            forecast_multistep(model.as_ref(), &scaler, &window, config.forecast_periods)?
        } else {
            Vec::new()
        };

        Ok(PipelineOutput {
            symbol: symbol.to_string(),
            estimator: model.name().to_string(),
            metrics,
            pairs,
            forecast,
            scaler,
            train_rows: parts.train.len(),
            test_rows: parts.test.len(),
        })
    };

    stage().map_err(|e| e.with_symbol(symbol))
}
