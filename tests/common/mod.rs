#![allow(dead_code)]

use chrono::NaiveDate;
use lagcast::domain::batch::BatchReport;
use lagcast::domain::config::RunConfig;
use lagcast::domain::error::LagcastError;
use lagcast::domain::estimator::EstimatorKind;
use lagcast::domain::price::PriceSeries;
use lagcast::ports::data_port::{LoadedSeries, PriceLoader};
use lagcast::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MockPriceLoader {
    pub tables: HashMap<String, Vec<PriceSeries>>,
    pub rejected: HashMap<String, Vec<(String, String)>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceLoader {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            rejected: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, table: &str, series: PriceSeries) -> Self {
        self.tables.entry(table.to_string()).or_default().push(series);
        self
    }

    /// A symbol the loader found but could not turn into a valid series.
    pub fn with_invalid(mut self, table: &str, symbol: &str, reason: &str) -> Self {
        self.rejected
            .entry(table.to_string())
            .or_default()
            .push((symbol.to_string(), reason.to_string()));
        self
    }

    pub fn with_error(mut self, table: &str, reason: &str) -> Self {
        self.errors.insert(table.to_string(), reason.to_string());
        self
    }
}

impl PriceLoader for MockPriceLoader {
    fn load_prices(&self, table: &str) -> Result<Vec<LoadedSeries>, LagcastError> {
        if let Some(reason) = self.errors.get(table) {
            return Err(LagcastError::Database {
                reason: reason.clone(),
            });
        }
        let mut loaded: Vec<(String, LoadedSeries)> = self
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .map(|s| (s.symbol().to_string(), Ok(s.clone())))
            .collect();
        for (symbol, reason) in self.rejected.get(table).into_iter().flatten() {
            let err = LagcastError::InvalidSeries {
                symbol: symbol.clone(),
                reason: reason.clone(),
            };
            loaded.push((symbol.clone(), Err(err)));
        }
        loaded.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(loaded.into_iter().map(|(_, entry)| entry).collect())
    }

    fn list_symbols(&self, table: &str) -> Result<Vec<String>, LagcastError> {
        Ok(self
            .load_prices(table)?
            .iter()
            .filter_map(|entry| match entry {
                Ok(s) => Some(s.symbol().to_string()),
                Err(e) => e.symbol().map(str::to_string),
            })
            .collect())
    }
}

/// Captures what would have been written instead of touching disk.
#[derive(Default)]
pub struct RecordingReport {
    pub calls: RefCell<Vec<(Vec<String>, PathBuf)>>,
}

impl ReportPort for RecordingReport {
    fn write_report(
        &self,
        report: &BatchReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LagcastError> {
        let symbols = report
            .outcomes
            .iter()
            .map(|o| o.symbol().to_string())
            .collect();
        self.calls
            .borrow_mut()
            .push((symbols, output_dir.to_path_buf()));
        Ok(Vec::new())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_series(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::from_closes(symbol, date(2024, 1, 1), closes).unwrap()
}

/// Deterministic wavy uptrend, enough structure for a model to fit.
pub fn wavy_closes(n: usize, base: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            base + 0.5 * t + 3.0 * (t / 3.0).sin()
        })
        .collect()
}

pub fn linear_run_config(lag_days: usize) -> RunConfig {
    let mut config = RunConfig::default();
    config.pipeline.lag_days = lag_days;
    config.model.kind = EstimatorKind::Linear;
    config
}

pub fn forest_run_config(lag_days: usize, n_trees: usize) -> RunConfig {
    let mut config = RunConfig::default();
    config.pipeline.lag_days = lag_days;
    config.model.kind = EstimatorKind::RandomForest;
    config.model.forest.n_trees = n_trees;
    config.model.forest.max_depth = 6;
    config
}

/// CSV body with `date,symbol,close` rows on consecutive days.
pub fn price_csv(series: &[(&str, Vec<f64>)]) -> String {
    let mut out = String::from("date,symbol,close\n");
    for (symbol, closes) in series {
        for (i, close) in closes.iter().enumerate() {
            let d = date(2024, 1, 1) + chrono::Duration::days(i as i64);
            out.push_str(&format!("{},{},{}\n", d.format("%Y-%m-%d"), symbol, close));
        }
    }
    out
}
