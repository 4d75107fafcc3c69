//! Typed run configuration built from `[data]`, `[pipeline]`, `[model]`,
//! `[backtest]` and `[report]`.

use std::path::PathBuf;
use std::str::FromStr;

use super::backtest::TradingParams;
use super::config_validation::{
    float_value, int_value, is_identifier, validate_data_config, validate_run_config,
};
use super::error::LagcastError;
use super::estimator::{EstimatorConfig, EstimatorKind, ForestConfig};
use super::pipeline::{PipelineConfig, SplitMode};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TABLE: &str = "prices";

/// Everything `run_batch` needs. Data source and report location live in
/// [`AppConfig`] because the core never touches storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunConfig {
    pub pipeline: PipelineConfig,
    pub trading: TradingParams,
    pub model: EstimatorConfig,
    /// Run symbols on the rayon pool.
    pub parallel: bool,
}

impl RunConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LagcastError> {
        validate_run_config(config)?;

        let split_mode = match config.get_string("pipeline", "split_mode") {
            Some(s) => parse_or_invalid("pipeline", "split_mode", &s)?,
            None => SplitMode::default(),
        };

        let pipeline = PipelineConfig {
            lag_days: int_value(config, "pipeline", "lag_days", 5)? as usize,
            test_fraction: float_value(config, "pipeline", "test_fraction", 0.2)?,
            split_mode,
            forecast_periods: int_value(config, "pipeline", "forecast_periods", 5)? as usize,
            estimator_seed: int_value(config, "pipeline", "estimator_seed", 42)? as u64,
        };

        let kind = match config.get_string("model", "estimator") {
            Some(s) => parse_or_invalid("model", "estimator", &s)?,
            None => EstimatorKind::RandomForest,
        };
        let max_features = match config.get_string("model", "max_features") {
            Some(_) => Some(int_value(config, "model", "max_features", 1)? as usize),
            None => None,
        };
        let model = EstimatorConfig {
            kind,
            forest: ForestConfig {
                n_trees: int_value(config, "model", "n_trees", 100)? as usize,
                max_depth: int_value(config, "model", "max_depth", 10)? as usize,
                min_samples_split: int_value(config, "model", "min_samples_split", 2)? as usize,
                min_samples_leaf: int_value(config, "model", "min_samples_leaf", 1)? as usize,
                max_features,
                bootstrap: config.get_bool("model", "bootstrap", true),
                seed: pipeline.estimator_seed,
            },
        };

        let trading = TradingParams {
            initial_cash: float_value(config, "backtest", "initial_cash", 10_000.0)?,
            trade_size: int_value(config, "backtest", "trade_size", 10)? as u64,
            threshold: float_value(config, "backtest", "threshold", 0.01)?,
            risk_free_rate: float_value(config, "backtest", "risk_free_rate", 0.01)?,
        };

        let run = RunConfig {
            pipeline,
            trading,
            model,
            parallel: config.get_bool("pipeline", "parallel", false),
        };
        run.validate()?;
        Ok(run)
    }

    /// Re-check typed values for callers that build the struct directly.
    pub fn validate(&self) -> Result<(), LagcastError> {
        let p = &self.pipeline;
        if p.lag_days < 1 {
            return Err(LagcastError::invalid(
                "pipeline",
                "lag_days",
                "lag_days must be at least 1",
            ));
        }
        if !(p.test_fraction > 0.0 && p.test_fraction < 1.0) {
            return Err(LagcastError::invalid(
                "pipeline",
                "test_fraction",
                "test_fraction must be between 0 and 1 exclusive",
            ));
        }

        let t = &self.trading;
        if !(t.initial_cash > 0.0) || !t.initial_cash.is_finite() {
            return Err(LagcastError::invalid(
                "backtest",
                "initial_cash",
                "initial_cash must be positive",
            ));
        }
        if t.trade_size == 0 {
            return Err(LagcastError::invalid(
                "backtest",
                "trade_size",
                "trade_size must be at least 1",
            ));
        }
        if !(t.threshold >= 0.0) || !t.threshold.is_finite() {
            return Err(LagcastError::invalid(
                "backtest",
                "threshold",
                "threshold must be non-negative",
            ));
        }
        if !t.risk_free_rate.is_finite() {
            return Err(LagcastError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be a finite number",
            ));
        }

        let f = &self.model.forest;
        if self.model.kind == EstimatorKind::RandomForest {
            if f.n_trees == 0 {
                return Err(LagcastError::invalid(
                    "model",
                    "n_trees",
                    "n_trees must be at least 1",
                ));
            }
            if f.max_depth == 0 {
                return Err(LagcastError::invalid(
                    "model",
                    "max_depth",
                    "max_depth must be at least 1",
                ));
            }
            if f.min_samples_split < 2 {
                return Err(LagcastError::invalid(
                    "model",
                    "min_samples_split",
                    "min_samples_split must be at least 2",
                ));
            }
            if f.min_samples_leaf == 0 {
                return Err(LagcastError::invalid(
                    "model",
                    "min_samples_leaf",
                    "min_samples_leaf must be at least 1",
                ));
            }
            if f.max_features == Some(0) {
                return Err(LagcastError::invalid(
                    "model",
                    "max_features",
                    "max_features must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    #[default]
    Csv,
    Sqlite,
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!(
                "unknown data source '{other}', expected csv or sqlite"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub source: DataSource,
    /// Directory of CSV files, or the SQLite database file.
    pub path: PathBuf,
    pub table: String,
    /// Restrict the run to these symbols; `None` runs everything loaded.
    pub symbols: Option<Vec<String>>,
    /// Connection pool size for the SQLite source.
    pub pool_size: u32,
}

impl DataConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LagcastError> {
        validate_data_config(config)?;

        let source = match config.get_string("data", "source") {
            Some(s) => parse_or_invalid("data", "source", &s)?,
            None => DataSource::default(),
        };
        let path = config
            .get_string("data", "path")
            .map(|p| PathBuf::from(p.trim()))
            .ok_or_else(|| LagcastError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;
        let table = config
            .get_string("data", "table")
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if !is_identifier(&table) {
            return Err(LagcastError::invalid(
                "data",
                "table",
                "table must contain only letters, digits and underscores",
            ));
        }

        let symbols = match config.get_string("data", "symbols") {
            Some(s) if !s.trim().is_empty() => Some(
                super::batch::parse_symbols(&s)
                    .map_err(|e| LagcastError::invalid("data", "symbols", e.to_string()))?,
            ),
            _ => None,
        };

        Ok(DataConfig {
            source,
            path,
            table,
            symbols,
            pool_size: int_value(config, "data", "pool_size", 4)?.max(1) as u32,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub write_backtest: bool,
    pub write_forecast: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            output_dir: PathBuf::from("output"),
            write_backtest: true,
            write_forecast: true,
        }
    }
}

impl ReportConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = ReportConfig::default();
        ReportConfig {
            output_dir: config
                .get_string("report", "output_dir")
                .filter(|s| !s.trim().is_empty())
                .map(|s| PathBuf::from(s.trim()))
                .unwrap_or(defaults.output_dir),
            write_backtest: config.get_bool("report", "write_backtest", defaults.write_backtest),
            write_forecast: config.get_bool("report", "write_forecast", defaults.write_forecast),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data: DataConfig,
    pub run: RunConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LagcastError> {
        Ok(AppConfig {
            data: DataConfig::from_config(config)?,
            run: RunConfig::from_config(config)?,
            report: ReportConfig::from_config(config),
        })
    }
}

fn parse_or_invalid<T>(section: &str, key: &str, raw: &str) -> Result<T, LagcastError>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|reason| LagcastError::invalid(section, key, reason))
}
