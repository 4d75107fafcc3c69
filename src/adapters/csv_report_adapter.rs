//! CSV report adapter implementing ReportPort.
//!
//! Writes one `metrics.csv` and one `outcomes.csv` per batch, plus per-symbol
//! backtest, signal and forecast tables. Undefined metrics are written as
//! `NaN` so every row keeps the same numeric columns. Headers are written up
//! front, so a table with no rows still names its columns.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::batch::{BatchReport, MetricsRecord, SymbolReport};
use crate::domain::config::ReportConfig;
use crate::domain::error::LagcastError;
use crate::ports::report_port::ReportPort;

const METRICS_HEADER: [&str; 15] = [
    "symbol",
    "estimator",
    "train_rows",
    "test_rows",
    "mse",
    "rmse",
    "mae",
    "r2",
    "mape",
    "smape",
    "total_return_pct",
    "max_drawdown_pct",
    "sharpe_ratio",
    "trades",
    "final_capital",
];
const OUTCOMES_HEADER: [&str; 3] = ["symbol", "status", "reason"];
const BACKTEST_HEADER: [&str; 7] = [
    "Step",
    "Date",
    "Capital",
    "Cash",
    "Position",
    "Actual_Price",
    "Predicted_Price",
];
const SIGNALS_HEADER: [&str; 4] = ["Step", "Date", "Signal", "Price"];
const FORECAST_HEADER: [&str; 2] = ["Horizon", "Predicted_Price"];

#[derive(Debug, Serialize)]
struct MetricsRow<'a> {
    symbol: &'a str,
    estimator: &'a str,
    train_rows: usize,
    test_rows: usize,
    mse: f64,
    rmse: f64,
    mae: f64,
    r2: f64,
    mape: f64,
    smape: f64,
    total_return_pct: f64,
    max_drawdown_pct: f64,
    sharpe_ratio: f64,
    trades: usize,
    final_capital: f64,
}

impl<'a> From<&'a MetricsRecord> for MetricsRow<'a> {
    fn from(r: &'a MetricsRecord) -> Self {
        let nan = |v: Option<f64>| v.unwrap_or(f64::NAN);
        MetricsRow {
            symbol: &r.symbol,
            estimator: &r.estimator,
            train_rows: r.train_rows,
            test_rows: r.test_rows,
            mse: r.mse,
            rmse: r.rmse,
            mae: r.mae,
            r2: nan(r.r2),
            mape: nan(r.mape),
            smape: nan(r.smape),
            total_return_pct: nan(r.total_return_pct),
            max_drawdown_pct: nan(r.max_drawdown_pct),
            sharpe_ratio: nan(r.sharpe_ratio),
            trades: r.trades,
            final_capital: nan(r.final_capital),
        }
    }
}

#[derive(Debug, Serialize)]
struct BacktestRow {
    step: usize,
    date: String,
    capital: f64,
    cash: f64,
    position: u64,
    actual_price: f64,
    predicted_price: f64,
}

#[derive(Debug, Serialize)]
struct SignalRow {
    step: usize,
    date: String,
    signal: String,
    price: f64,
}

#[derive(Debug, Serialize)]
struct ForecastRow {
    horizon: usize,
    predicted_price: f64,
}

#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    symbol: &'a str,
    status: &'a str,
    reason: &'a str,
}

pub struct CsvReportAdapter {
    write_backtest: bool,
    write_forecast: bool,
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self {
            write_backtest: true,
            write_forecast: true,
        }
    }
}

impl CsvReportAdapter {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            write_backtest: config.write_backtest,
            write_forecast: config.write_forecast,
        }
    }

    fn write_symbol(
        &self,
        report: &SymbolReport,
        dir: &Path,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), LagcastError> {
        let stem = file_stem(&report.record.symbol);

        if self.write_backtest {
            let snapshots = &report.backtest.snapshots;
            let path = dir.join(format!("{stem}_backtest.csv"));
            write_rows(
                &path,
                &BACKTEST_HEADER,
                snapshots.iter().map(|s| BacktestRow {
                    step: s.step,
                    date: s.date.format("%Y-%m-%d").to_string(),
                    capital: s.capital,
                    cash: s.cash,
                    position: s.position,
                    actual_price: s.actual_price,
                    predicted_price: s.predicted_price,
                }),
            )?;
            written.push(path);

            let path = dir.join(format!("{stem}_signals.csv"));
            write_rows(
                &path,
                &SIGNALS_HEADER,
                report.backtest.signals.iter().filter_map(|sig| {
                    snapshots.get(sig.index).map(|s| SignalRow {
                        step: sig.index,
                        date: s.date.format("%Y-%m-%d").to_string(),
                        signal: sig.kind.to_string(),
                        price: s.actual_price,
                    })
                }),
            )?;
            written.push(path);
        }

        if self.write_forecast && !report.forecast.is_empty() {
            let path = dir.join(format!("{stem}_forecast.csv"));
            write_rows(
                &path,
                &FORECAST_HEADER,
                report
                    .forecast
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| ForecastRow {
                        horizon: i + 1,
                        predicted_price: p,
                    }),
            )?;
            written.push(path);
        }

        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_report(
        &self,
        report: &BatchReport,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, LagcastError> {
        fs::create_dir_all(output_dir).map_err(|e| LagcastError::Report {
            reason: format!("failed to create {}: {}", output_dir.display(), e),
        })?;

        let mut written = Vec::new();

        let path = output_dir.join("metrics.csv");
        write_rows(
            &path,
            &METRICS_HEADER,
            report.records().into_iter().map(MetricsRow::from),
        )?;
        written.push(path);

        let path = output_dir.join("outcomes.csv");
        write_rows(
            &path,
            &OUTCOMES_HEADER,
            report.outcomes.iter().map(|o| OutcomeRow {
                symbol: o.symbol(),
                status: o.status(),
                reason: o.reason().unwrap_or(""),
            }),
        )?;
        written.push(path);

        for symbol_report in report.completed() {
            self.write_symbol(symbol_report, output_dir, &mut written)?;
        }

        info!(files = written.len(), dir = %output_dir.display(), "report written");
        Ok(written)
    }
}

fn write_rows<T, I>(path: &Path, header: &[&str], rows: I) -> Result<(), LagcastError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let report_err = |e: csv::Error| LagcastError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    };

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(report_err)?;
    wtr.write_record(header).map_err(report_err)?;
    for row in rows {
        wtr.serialize(row).map_err(report_err)?;
    }
    wtr.flush().map_err(|e| LagcastError::Report {
        reason: format!("failed to flush {}: {}", path.display(), e),
    })?;
    Ok(())
}

/// Symbol as a safe file-name component.
fn file_stem(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
