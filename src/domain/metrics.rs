//! Risk and performance metrics over a capital curve.

use tracing::warn;

use super::error::UndefinedMetric;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestMetrics {
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    /// Longest run of consecutive steps spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: Option<f64>,
}

impl BacktestMetrics {
    pub fn compute(curve: &[f64], initial_cash: f64, risk_free_rate: f64) -> Self {
        let sharpe_ratio = match sharpe_ratio(&returns(curve), risk_free_rate) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{e}");
                None
            }
        };

        BacktestMetrics {
            total_return_pct: total_return(curve, initial_cash),
            max_drawdown_pct: max_drawdown(curve),
            max_drawdown_duration: max_drawdown_duration(curve),
            sharpe_ratio,
        }
    }
}

/// Largest peak-to-trough decline, in percent of the running peak.
///
/// A point whose running peak is zero contributes no drawdown.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &capital in curve {
        running_max = running_max.max(capital);
        if running_max > 0.0 {
            let dd = (running_max - capital) / running_max;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd * 100.0
}

pub fn max_drawdown_duration(curve: &[f64]) -> usize {
    let mut running_max = f64::NEG_INFINITY;
    let mut current = 0usize;
    let mut longest = 0usize;

    for &capital in curve {
        if capital >= running_max {
            running_max = capital;
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }

    longest
}

/// Step-over-step simple returns. Steps starting from zero capital are
/// skipped rather than producing an infinite return.
pub fn returns(curve: &[f64]) -> Vec<f64> {
    curve
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualised Sharpe ratio of `returns` over a daily risk-free rate of
/// `risk_free_rate / 252`, using the sample standard deviation.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> Result<f64, UndefinedMetric> {
    if returns.len() < 2 {
        return Err(UndefinedMetric::new(
            "sharpe_ratio",
            format!("need at least 2 returns, have {}", returns.len()),
        ));
    }

    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let variance = excess.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = variance.sqrt();

    if !(std > f64::EPSILON) {
        return Err(UndefinedMetric::new(
            "sharpe_ratio",
            "excess returns have zero standard deviation",
        ));
    }

    Ok(mean / std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Final capital relative to `initial_cash`, in percent. An empty curve has
/// not moved.
pub fn total_return(curve: &[f64], initial_cash: f64) -> f64 {
    match curve.last() {
        Some(&last) if initial_cash != 0.0 => (last - initial_cash) / initial_cash * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn drawdown_peak_to_trough() {
        let curve = [100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        assert_relative_eq!(max_drawdown(&curve), (110.0 - 80.0) / 110.0 * 100.0);
    }

    #[test]
    fn drawdown_zero_for_rising_curve() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn drawdown_to_zero_is_full() {
        assert_relative_eq!(max_drawdown(&[100.0, 0.0]), 100.0);
    }

    #[test]
    fn drawdown_all_zero_curve() {
        assert_eq!(max_drawdown(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn drawdown_duration_counts_steps_under_peak() {
        let curve = [100.0, 110.0, 100.0, 90.0, 85.0, 95.0, 120.0, 119.0];
        assert_eq!(max_drawdown_duration(&curve), 4);
        assert_eq!(max_drawdown_duration(&[1.0, 2.0, 3.0]), 0);
    }

    #[test]
    fn returns_skip_zero_base() {
        let r = returns(&[100.0, 110.0, 0.0, 50.0, 55.0]);
        assert_eq!(r.len(), 3);
        assert_relative_eq!(r[0], 0.1);
        assert_relative_eq!(r[1], -1.0);
        assert_relative_eq!(r[2], 0.1);
    }

    #[test]
    fn sharpe_constant_curve_is_undefined() {
        let r = returns(&[1000.0, 1000.0, 1000.0]);
        let err = sharpe_ratio(&r, 0.0).unwrap_err();
        assert_eq!(err.metric, "sharpe_ratio");
        assert!(sharpe_ratio(&r, 0.05).is_err());
    }

    #[test]
    fn sharpe_needs_two_samples() {
        assert!(sharpe_ratio(&[0.01], 0.0).is_err());
        assert!(sharpe_ratio(&[], 0.0).is_err());
    }

    #[test]
    fn sharpe_matches_formula() {
        let r = [0.01, -0.005, 0.02, 0.0];
        let rf = 0.0252;
        let excess: Vec<f64> = r.iter().map(|x| x - rf / 252.0).collect();
        let mean = excess.iter().sum::<f64>() / 4.0;
        let var = excess.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / var.sqrt() * 252f64.sqrt();
        assert_relative_eq!(sharpe_ratio(&r, rf).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn total_return_percent() {
        assert_relative_eq!(total_return(&[1000.0, 1100.0], 1000.0), 10.0);
        assert_relative_eq!(total_return(&[900.0], 1000.0), -10.0);
        assert_eq!(total_return(&[], 1000.0), 0.0);
    }

    #[test]
    fn compute_marks_undefined_sharpe() {
        let m = BacktestMetrics::compute(&[1000.0, 1000.0, 1000.0], 1000.0, 0.0);
        assert_eq!(m.sharpe_ratio, None);
        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.max_drawdown_pct, 0.0);
        assert_eq!(m.max_drawdown_duration, 0);
    }
}
