//! Domain error types.

/// A metric whose value is mathematically undefined for the given input
/// (zero denominators, too few samples). Reported as `None`, never as zero.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{metric} is undefined: {reason}")]
pub struct UndefinedMetric {
    pub metric: &'static str,
    pub reason: String,
}

impl UndefinedMetric {
    pub fn new(metric: &'static str, reason: impl Into<String>) -> Self {
        UndefinedMetric {
            metric,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for lagcast.
#[derive(Debug, thiserror::Error)]
pub enum LagcastError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid price series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {rows} rows, need {minimum}")]
    InsufficientData {
        symbol: String,
        rows: usize,
        minimum: usize,
    },

    #[error("training failed for {symbol}: {reason}")]
    Training { symbol: String, reason: String },

    #[error(transparent)]
    UndefinedMetric(#[from] UndefinedMetric),

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LagcastError {
    /// Shorthand for a `[section] key` validation failure.
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        LagcastError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach `symbol` to errors raised below the per-symbol layer.
    pub fn with_symbol(self, symbol: &str) -> Self {
        match self {
            LagcastError::Training { symbol: s, reason } if s.is_empty() => {
                LagcastError::Training {
                    symbol: symbol.to_string(),
                    reason,
                }
            }
            LagcastError::InsufficientData {
                symbol: s,
                rows,
                minimum,
            } if s.is_empty() => LagcastError::InsufficientData {
                symbol: symbol.to_string(),
                rows,
                minimum,
            },
            other => other,
        }
    }

    /// The symbol a per-symbol error belongs to, when it names one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            LagcastError::NoData { symbol }
            | LagcastError::InvalidSeries { symbol, .. }
            | LagcastError::InsufficientData { symbol, .. }
            | LagcastError::Training { symbol, .. }
                if !symbol.is_empty() =>
            {
                Some(symbol.as_str())
            }
            _ => None,
        }
    }

    /// Whether the error only concerns one symbol and the batch may continue.
    pub fn is_per_symbol(&self) -> bool {
        matches!(
            self,
            LagcastError::NoData { .. }
                | LagcastError::InvalidSeries { .. }
                | LagcastError::InsufficientData { .. }
                | LagcastError::Training { .. }
                | LagcastError::UndefinedMetric(_)
        )
    }
}

impl From<&LagcastError> for std::process::ExitCode {
    fn from(err: &LagcastError) -> Self {
        let code: u8 = match err {
            LagcastError::Io(_) => 1,
            LagcastError::ConfigParse { .. }
            | LagcastError::ConfigMissing { .. }
            | LagcastError::ConfigInvalid { .. } => 2,
            LagcastError::Database { .. } | LagcastError::DatabaseQuery { .. } => 3,
            LagcastError::NoData { .. }
            | LagcastError::InvalidSeries { .. }
            | LagcastError::InsufficientData { .. } => 5,
            LagcastError::Training { .. } | LagcastError::UndefinedMetric(_) => 6,
            LagcastError::Report { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = LagcastError::InsufficientData {
            symbol: "BHP".into(),
            rows: 0,
            minimum: 1,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for BHP: have 0 rows, need 1"
        );
    }

    #[test]
    fn undefined_metric_converts() {
        let err: LagcastError = UndefinedMetric::new("mape", "all actual values are zero").into();
        assert_eq!(err.to_string(), "mape is undefined: all actual values are zero");
        assert!(err.is_per_symbol());
    }

    #[test]
    fn config_errors_are_not_per_symbol() {
        let err = LagcastError::invalid("pipeline", "lag_days", "must be at least 1");
        assert!(!err.is_per_symbol());
        assert_eq!(
            err.to_string(),
            "invalid config value [pipeline] lag_days: must be at least 1"
        );
    }

    #[test]
    fn with_symbol_fills_blank_symbol_only() {
        let blank = LagcastError::Training {
            symbol: String::new(),
            reason: "x".into(),
        };
        assert!(matches!(
            blank.with_symbol("BHP"),
            LagcastError::Training { symbol, .. } if symbol == "BHP"
        ));

        let named = LagcastError::Training {
            symbol: "CBA".into(),
            reason: "x".into(),
        };
        assert!(matches!(
            named.with_symbol("BHP"),
            LagcastError::Training { symbol, .. } if symbol == "CBA"
        ));
    }

    #[test]
    fn symbol_names_the_failing_series() {
        let err = LagcastError::NoData { symbol: "ZZZ".into() };
        assert_eq!(err.symbol(), Some("ZZZ"));
        assert!(err.is_per_symbol());
        assert_eq!(err.to_string(), "no price data for ZZZ");

        let blank = LagcastError::Training {
            symbol: String::new(),
            reason: "x".into(),
        };
        assert_eq!(blank.symbol(), None);
        assert_eq!(LagcastError::Report { reason: "x".into() }.symbol(), None);
    }

    #[test]
    fn training_is_per_symbol() {
        let err = LagcastError::Training {
            symbol: "CBA".into(),
            reason: "empty training set".into(),
        };
        assert!(err.is_per_symbol());
    }
}
