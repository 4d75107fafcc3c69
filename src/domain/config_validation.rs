//! Configuration validation.
//!
//! Checks raw INI values before anything is cast into typed config, so a
//! negative `trade_size` is reported as such instead of wrapping around.

use crate::domain::error::LagcastError;
use crate::domain::estimator::EstimatorKind;
use crate::domain::pipeline::SplitMode;
use crate::ports::config_port::ConfigPort;

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), LagcastError> {
    validate_pipeline(config)?;
    validate_model(config)?;
    validate_backtest(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), LagcastError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" | "sqlite" => {}
        other => {
            return Err(LagcastError::invalid(
                "data",
                "source",
                format!("unknown data source '{other}', expected csv or sqlite"),
            ));
        }
    }

    require_non_empty(config, "data", "path")?;

    if let Some(table) = config.get_string("data", "table") {
        if !is_identifier(&table) {
            return Err(LagcastError::invalid(
                "data",
                "table",
                "table must contain only letters, digits and underscores",
            ));
        }
    }
    Ok(())
}

fn validate_pipeline(config: &dyn ConfigPort) -> Result<(), LagcastError> {
    let lag_days = int_value(config, "pipeline", "lag_days", 5)?;
    if lag_days < 1 {
        return Err(LagcastError::invalid(
            "pipeline",
            "lag_days",
            "lag_days must be at least 1",
        ));
    }

    let test_fraction = float_value(config, "pipeline", "test_fraction", 0.2)?;
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(LagcastError::invalid(
            "pipeline",
            "test_fraction",
            "test_fraction must be between 0 and 1 exclusive",
        ));
    }

    if let Some(mode) = config.get_string("pipeline", "split_mode") {
        mode.parse::<SplitMode>()
            .map_err(|reason| LagcastError::invalid("pipeline", "split_mode", reason))?;
    }

    let periods = int_value(config, "pipeline", "forecast_periods", 5)?;
    if periods < 0 {
        return Err(LagcastError::invalid(
            "pipeline",
            "forecast_periods",
            "forecast_periods must be non-negative",
        ));
    }

    let seed = int_value(config, "pipeline", "estimator_seed", 42)?;
    if seed < 0 {
        return Err(LagcastError::invalid(
            "pipeline",
            "estimator_seed",
            "estimator_seed must be non-negative",
        ));
    }
    Ok(())
}

fn validate_model(config: &dyn ConfigPort) -> Result<(), LagcastError> {
    if let Some(kind) = config.get_string("model", "estimator") {
        kind.parse::<EstimatorKind>()
            .map_err(|reason| LagcastError::invalid("model", "estimator", reason))?;
    }

    for (key, default, minimum) in [
        ("n_trees", 100, 1),
        ("max_depth", 10, 1),
        ("min_samples_split", 2, 2),
        ("min_samples_leaf", 1, 1),
    ] {
        let value = int_value(config, "model", key, default)?;
        if value < minimum {
            return Err(LagcastError::invalid(
                "model",
                key,
                format!("{key} must be at least {minimum}"),
            ));
        }
    }

    if config.get_string("model", "max_features").is_some() {
        let value = int_value(config, "model", "max_features", 0)?;
        if value < 1 {
            return Err(LagcastError::invalid(
                "model",
                "max_features",
                "max_features must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), LagcastError> {
    let initial_cash = float_value(config, "backtest", "initial_cash", 10_000.0)?;
    if !(initial_cash > 0.0) || !initial_cash.is_finite() {
        return Err(LagcastError::invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }

    let trade_size = int_value(config, "backtest", "trade_size", 10)?;
    if trade_size < 1 {
        return Err(LagcastError::invalid(
            "backtest",
            "trade_size",
            "trade_size must be at least 1",
        ));
    }

    let threshold = float_value(config, "backtest", "threshold", 0.01)?;
    if !(threshold >= 0.0) || !threshold.is_finite() {
        return Err(LagcastError::invalid(
            "backtest",
            "threshold",
            "threshold must be non-negative",
        ));
    }

    let rate = float_value(config, "backtest", "risk_free_rate", 0.01)?;
    if !rate.is_finite() {
        return Err(LagcastError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be a finite number",
        ));
    }
    Ok(())
}

/// Integer value of `[section] key`, or `default` when absent. A present but
/// non-numeric value is an error rather than a silent fallback.
pub(crate) fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, LagcastError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            LagcastError::invalid(section, key, format!("'{raw}' is not an integer"))
        }),
    }
}

pub(crate) fn float_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, LagcastError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            LagcastError::invalid(section, key, format!("'{raw}' is not a number"))
        }),
    }
}

fn require_non_empty(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, LagcastError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(LagcastError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
