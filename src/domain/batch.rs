//! Multi-symbol batch runs.
//!
//! Each symbol goes through its own pipeline and simulator. A symbol that
//! lacks data is skipped, and a symbol whose series is malformed or whose
//! model fails is marked failed; the rest of the batch carries on. Only an
//! invalid configuration or a table-level loader error stops the run.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{info, warn};

use super::backtest::{BacktestResult, run_backtest};
use super::config::RunConfig;
use super::error::LagcastError;
use super::estimator::ModelFactory;
use super::pipeline::run_pipeline;
use super::price::PriceSeries;
use crate::ports::data_port::LoadedSeries;

/// Flat per-symbol summary, one row of `metrics.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub symbol: String,
    pub estimator: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
    pub smape: Option<f64>,
    pub total_return_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub trades: usize,
    pub final_capital: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub record: MetricsRecord,
    pub backtest: BacktestResult,
    pub forecast: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    Completed(Box<SymbolReport>),
    Skipped { symbol: String, reason: String },
    Failed { symbol: String, reason: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Completed(report) => &report.record.symbol,
            SymbolOutcome::Skipped { symbol, .. } | SymbolOutcome::Failed { symbol, .. } => symbol,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            SymbolOutcome::Completed(_) => "completed",
            SymbolOutcome::Skipped { .. } => "skipped",
            SymbolOutcome::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SymbolOutcome::Completed(_) => None,
            SymbolOutcome::Skipped { reason, .. } | SymbolOutcome::Failed { reason, .. } => {
                Some(reason)
            }
        }
    }

    pub fn report(&self) -> Option<&SymbolReport> {
        match self {
            SymbolOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Outcomes in the same order as the input series.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SymbolOutcome>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &SymbolReport> {
        self.outcomes.iter().filter_map(SymbolOutcome::report)
    }

    pub fn records(&self) -> Vec<&MetricsRecord> {
        self.completed().map(|r| &r.record).collect()
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SymbolOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SymbolOutcome::Failed { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub fn run_batch(
    series: &[PriceSeries],
    config: &RunConfig,
    factory: &dyn ModelFactory,
) -> Result<BatchReport, LagcastError> {
    config.validate()?;
    log_start(series.len(), config);
    let outcomes = collect_outcomes(series, config.parallel, |s| run_symbol(s, config, factory));
    Ok(finish(outcomes))
}

/// Like [`run_batch`], over loader output. Symbols the loader rejected, or
/// that were requested but never stored, keep their place in the report as
/// skipped or failed. A loader error that is not tied to one symbol aborts.
pub fn run_loaded(
    loaded: Vec<LoadedSeries>,
    config: &RunConfig,
    factory: &dyn ModelFactory,
) -> Result<BatchReport, LagcastError> {
    config.validate()?;

    let mut entries = Vec::with_capacity(loaded.len());
    for entry in loaded {
        match entry {
            Err(e) if !e.is_per_symbol() => return Err(e),
            other => entries.push(other),
        }
    }

    log_start(entries.len(), config);
    let outcomes = collect_outcomes(&entries, config.parallel, |entry| match entry {
        Ok(series) => run_symbol(series, config, factory),
        Err(e) => rejected(e),
    });
    Ok(finish(outcomes))
}

fn collect_outcomes<T, F>(items: &[T], parallel: bool, run: F) -> Vec<SymbolOutcome>
where
    T: Sync,
    F: Fn(&T) -> SymbolOutcome + Sync,
{
    if parallel {
        items.par_iter().map(&run).collect()
    } else {
        items.iter().map(&run).collect()
    }
}

fn log_start(symbols: usize, config: &RunConfig) {
    info!(
        symbols,
        parallel = config.parallel,
        lag_days = config.pipeline.lag_days,
        split_mode = %config.pipeline.split_mode,
        "starting batch"
    );
}

fn finish(outcomes: Vec<SymbolOutcome>) -> BatchReport {
    let report = BatchReport { outcomes };
    info!(
        completed = report.completed_count(),
        skipped = report.skipped_count(),
        failed = report.failed_count(),
        "batch finished"
    );
    report
}

/// Outcome for a symbol that never reached the pipeline.
fn rejected(err: &LagcastError) -> SymbolOutcome {
    let symbol = err.symbol().unwrap_or_default().to_string();
    let reason = err.to_string();
    match err {
        LagcastError::NoData { .. } | LagcastError::InsufficientData { .. } => {
            warn!(symbol = %symbol, "skipping: {reason}");
            SymbolOutcome::Skipped { symbol, reason }
        }
        _ => {
            warn!(symbol = %symbol, "failed: {reason}");
            SymbolOutcome::Failed { symbol, reason }
        }
    }
}

pub fn run_symbol(
    series: &PriceSeries,
    config: &RunConfig,
    factory: &dyn ModelFactory,
) -> SymbolOutcome {
    let symbol = series.symbol().to_string();

    let output = match run_pipeline(series, &config.pipeline, factory) {
        Ok(output) => output,
        Err(e @ LagcastError::InsufficientData { .. }) => {
            warn!(symbol = %symbol, "skipping: {e}");
            return SymbolOutcome::Skipped {
                symbol,
                reason: e.to_string(),
            };
        }
        Err(e) => {
            warn!(symbol = %symbol, "failed: {e}");
            return SymbolOutcome::Failed {
                symbol,
                reason: e.to_string(),
            };
        }
    };

    let backtest = run_backtest(&output.pairs, &config.trading);
    let m = &output.metrics;
    let bm = &backtest.metrics;
    let record = MetricsRecord {
        symbol: symbol.clone(),
        estimator: output.estimator.clone(),
        train_rows: output.train_rows,
        test_rows: output.test_rows,
        mse: m.mse,
        rmse: m.rmse,
        mae: m.mae,
        r2: m.r2,
        mape: m.mape,
        smape: m.smape,
        total_return_pct: Some(bm.total_return_pct),
        max_drawdown_pct: Some(bm.max_drawdown_pct),
        sharpe_ratio: bm.sharpe_ratio,
        trades: backtest.signals.len(),
        final_capital: backtest.snapshots.last().map(|s| s.capital),
    };

    info!(
        symbol = %symbol,
        rmse = record.rmse,
        total_return_pct = bm.total_return_pct,
        trades = record.trades,
        "symbol completed"
    );

    SymbolOutcome::Completed(Box::new(SymbolReport {
        record,
        backtest,
        forecast: output.forecast,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Parse a comma-separated symbol list: trimmed, upper-cased, no blanks and
/// no repeats.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Keep the entries named in `wanted`, in `wanted` order. A requested
/// symbol the loader never returned becomes a `NoData` entry.
pub fn select_symbols(loaded: Vec<LoadedSeries>, wanted: &[String]) -> Vec<LoadedSeries> {
    let mut pool: Vec<Option<LoadedSeries>> = loaded.into_iter().map(Some).collect();

    wanted
        .iter()
        .map(|symbol| {
            pool.iter_mut()
                .find(|slot| {
                    slot.as_ref().is_some_and(|entry| {
                        let name = match entry {
                            Ok(s) => Some(s.symbol()),
                            Err(e) => e.symbol(),
                        };
                        name.is_some_and(|n| n.eq_ignore_ascii_case(symbol))
                    })
                })
                .and_then(Option::take)
                .unwrap_or_else(|| {
                    warn!(symbol = %symbol, "no price data found");
                    Err(LagcastError::NoData {
                        symbol: symbol.clone(),
                    })
                })
        })
        .collect()
}
