//! Threshold trading simulator.
//!
//! Replays holdout predictions in chronological order. At each step the
//! predicted move relative to the actual price decides whether to buy or sell
//! one fixed lot; trades that cannot be afforded are skipped, never clamped.

use chrono::NaiveDate;
use tracing::debug;

use super::metrics::BacktestMetrics;
use super::pipeline::PredictionPair;
use super::portfolio::{PortfolioState, TradeSkipped};

#[derive(Debug, Clone, PartialEq)]
pub struct TradingParams {
    pub initial_cash: f64,
    pub trade_size: u64,
    pub threshold: f64,
    pub risk_free_rate: f64,
}

impl Default for TradingParams {
    fn default() -> Self {
        TradingParams {
            initial_cash: 10_000.0,
            trade_size: 10,
            threshold: 0.01,
            risk_free_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "buy"),
            SignalKind::Sell => write!(f, "sell"),
        }
    }
}

/// An executed trade at step `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub index: usize,
    pub kind: SignalKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Bought,
    Sold,
    Skipped(TradeSkipped),
    Hold,
    /// The actual price was zero so no relative change exists.
    UndefinedPrice,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEntry {
    pub step: usize,
    pub price_change: Option<f64>,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSnapshot {
    pub step: usize,
    pub date: NaiveDate,
    pub capital: f64,
    pub cash: f64,
    pub position: u64,
    pub actual_price: f64,
    pub predicted_price: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub snapshots: Vec<StepSnapshot>,
    pub buy_signals: Vec<usize>,
    pub sell_signals: Vec<usize>,
    pub signals: Vec<Signal>,
    pub trace: Vec<TraceEntry>,
    pub metrics: BacktestMetrics,
}

impl BacktestResult {
    pub fn capital_curve(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.capital).collect()
    }

    pub fn final_state(&self) -> Option<PortfolioState> {
        self.snapshots.last().map(|s| PortfolioState {
            cash: s.cash,
            position: s.position,
        })
    }
}

/// Relative move the model expects from `actual` to `predicted`.
pub fn price_change(actual: f64, predicted: f64) -> Option<f64> {
    if actual == 0.0 {
        None
    } else {
        Some((predicted - actual) / actual)
    }
}

fn decide(
    portfolio: &mut PortfolioState,
    change: Option<f64>,
    actual: f64,
    params: &TradingParams,
) -> Decision {
    let Some(change) = change else {
        return Decision::UndefinedPrice;
    };

    if change > params.threshold {
        match portfolio.try_buy(params.trade_size, actual) {
            Ok(()) => Decision::Bought,
            Err(skip) => Decision::Skipped(skip),
        }
    } else if change < -params.threshold {
        match portfolio.try_sell(params.trade_size, actual) {
            Ok(()) => Decision::Sold,
            Err(skip) => Decision::Skipped(skip),
        }
    } else {
        Decision::Hold
    }
}

pub fn run_backtest(pairs: &[PredictionPair], params: &TradingParams) -> BacktestResult {
    let mut portfolio = PortfolioState::new(params.initial_cash);
    let mut snapshots = Vec::with_capacity(pairs.len());
    let mut trace = Vec::with_capacity(pairs.len());
    let mut signals = Vec::new();

    for (step, pair) in pairs.iter().enumerate() {
        let change = price_change(pair.actual, pair.predicted);
        let decision = decide(&mut portfolio, change, pair.actual, params);

        match decision {
            Decision::Bought => signals.push(Signal {
                index: step,
                kind: SignalKind::Buy,
            }),
            Decision::Sold => signals.push(Signal {
                index: step,
                kind: SignalKind::Sell,
            }),
            _ => {}
        }

        debug!(
            step,
            date = %pair.date,
            actual = pair.actual,
            predicted = pair.predicted,
            ?change,
            ?decision,
            cash = portfolio.cash,
            position = portfolio.position,
            "backtest step"
        );

        trace.push(TraceEntry {
            step,
            price_change: change,
            decision,
        });
        snapshots.push(StepSnapshot {
            step,
            date: pair.date,
            capital: portfolio.capital(pair.actual),
            cash: portfolio.cash,
            position: portfolio.position,
            actual_price: pair.actual,
            predicted_price: pair.predicted,
        });
    }

    let buy_signals = signals
        .iter()
        .filter(|s| s.kind == SignalKind::Buy)
        .map(|s| s.index)
        .collect();
    let sell_signals = signals
        .iter()
        .filter(|s| s.kind == SignalKind::Sell)
        .map(|s| s.index)
        .collect();

    let curve: Vec<f64> = snapshots.iter().map(|s| s.capital).collect();
    let metrics = BacktestMetrics::compute(&curve, params.initial_cash, params.risk_free_rate);

    BacktestResult {
        snapshots,
        buy_signals,
        sell_signals,
        signals,
        trace,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(actual: &[f64], predicted: &[f64]) -> Vec<PredictionPair> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        actual
            .iter()
            .zip(predicted)
            .enumerate()
            .map(|(i, (&a, &p))| PredictionPair {
                date: start + chrono::Duration::days(i as i64),
                actual: a,
                predicted: p,
            })
            .collect()
    }

    fn params(initial_cash: f64, trade_size: u64, threshold: f64) -> TradingParams {
        TradingParams {
            initial_cash,
            trade_size,
            threshold,
            risk_free_rate: 0.0,
        }
    }

    #[test]
    fn buy_then_boundary_hold() {
        let result = run_backtest(&pairs(&[100.0, 100.0], &[102.0, 99.0]), &params(1000.0, 1, 0.01));

        let s0 = result.snapshots[0];
        assert!((s0.cash - 900.0).abs() < f64::EPSILON);
        assert_eq!(s0.position, 1);
        assert!((s0.capital - 1000.0).abs() < f64::EPSILON);

        let s1 = result.snapshots[1];
        assert!((s1.cash - 900.0).abs() < f64::EPSILON);
        assert_eq!(s1.position, 1);
        assert!((s1.capital - 1000.0).abs() < f64::EPSILON);

        assert_eq!(result.buy_signals, vec![0]);
        assert!(result.sell_signals.is_empty());
        assert_eq!(result.trace[0].decision, Decision::Bought);
        assert_eq!(result.trace[1].decision, Decision::Hold);
    }

    #[test]
    fn sell_after_buy() {
        let result = run_backtest(
            &pairs(&[100.0, 110.0], &[105.0, 100.0]),
            &params(1000.0, 2, 0.01),
        );
        assert_eq!(result.buy_signals, vec![0]);
        assert_eq!(result.sell_signals, vec![1]);
        let last = result.snapshots[1];
        assert_eq!(last.position, 0);
        assert!((last.cash - 1020.0).abs() < 1e-9);
        assert_eq!(
            result.signals,
            vec![
                Signal { index: 0, kind: SignalKind::Buy },
                Signal { index: 1, kind: SignalKind::Sell },
            ]
        );
    }

    #[test]
    fn insufficient_cash_skips() {
        let result = run_backtest(&pairs(&[100.0], &[120.0]), &params(50.0, 1, 0.01));
        assert!(result.buy_signals.is_empty());
        assert_eq!(
            result.trace[0].decision,
            Decision::Skipped(TradeSkipped::InsufficientCash)
        );
        assert!((result.snapshots[0].capital - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_without_position_skips() {
        let result = run_backtest(&pairs(&[100.0], &[80.0]), &params(1000.0, 1, 0.01));
        assert_eq!(
            result.trace[0].decision,
            Decision::Skipped(TradeSkipped::InsufficientPosition)
        );
        assert!(result.sell_signals.is_empty());
    }

    #[test]
    fn zero_actual_is_undefined_step() {
        let result = run_backtest(
            &pairs(&[100.0, 0.0, 100.0], &[105.0, 5.0, 100.0]),
            &params(1000.0, 1, 0.01),
        );
        assert_eq!(result.trace[1].decision, Decision::UndefinedPrice);
        assert_eq!(result.trace[1].price_change, None);
        let s1 = result.snapshots[1];
        assert_eq!(s1.position, 1);
        assert!((s1.cash - 900.0).abs() < f64::EPSILON);
        assert!((s1.capital - 900.0).abs() < f64::EPSILON);
        assert_eq!(result.snapshots.len(), 3);
    }

    #[test]
    fn zero_threshold_holds_on_exact_match() {
        let result = run_backtest(&pairs(&[100.0], &[100.0]), &params(1000.0, 1, 0.0));
        assert_eq!(result.trace[0].decision, Decision::Hold);
    }

    #[test]
    fn empty_input() {
        let result = run_backtest(&[], &params(1000.0, 1, 0.01));
        assert!(result.snapshots.is_empty());
        assert!(result.capital_curve().is_empty());
        assert_eq!(result.final_state(), None);
        assert_eq!(result.metrics.total_return_pct, 0.0);
        assert_eq!(result.metrics.sharpe_ratio, None);
    }

    #[test]
    fn capital_identity_holds() {
        let actual = [50.0, 52.0, 51.0, 49.0, 55.0, 53.0];
        let predicted = [53.0, 50.0, 54.0, 52.0, 50.0, 56.0];
        let result = run_backtest(&pairs(&actual, &predicted), &params(200.0, 2, 0.02));
        for s in &result.snapshots {
            assert!(s.cash >= 0.0);
            assert_eq!(s.capital, s.cash + s.position as f64 * s.actual_price);
        }
    }
}
