//! Property tests for feature windows, the trade simulator and risk metrics.

mod common;

use common::*;
use lagcast::domain::backtest::{TradingParams, run_backtest};
use lagcast::domain::features::{build_feature_matrix, expected_rows};
use lagcast::domain::metrics::{max_drawdown, total_return};
use lagcast::domain::pipeline::{PredictionPair, SplitMode, split};
use proptest::prelude::*;

fn closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..500.0, 0..max_len)
}

proptest! {
    #[test]
    fn feature_rows_match_length(values in closes(60), lag in 1usize..8) {
        let series = make_series("P", &values);
        let expected = expected_rows(values.len(), lag);
        match build_feature_matrix(&series, lag) {
            Ok(matrix) => {
                prop_assert_eq!(matrix.len(), expected);
                for row in &matrix.rows {
                    prop_assert_eq!(row.lags.len(), lag);
                }
            }
            Err(_) => prop_assert_eq!(expected, 0),
        }
    }

    #[test]
    fn split_partitions_rows(values in closes(80), fraction in 0.05f64..0.9, seed in any::<u64>(), random in any::<bool>()) {
        let series = make_series("P", &values);
        let Ok(matrix) = build_feature_matrix(&series, 2) else {
            return Ok(());
        };
        let mode = if random { SplitMode::Random } else { SplitMode::Chronological };
        if let Ok(parts) = split(&matrix, fraction, mode, seed) {
            prop_assert!(!parts.train.is_empty());
            prop_assert!(!parts.test.is_empty());
            prop_assert_eq!(parts.train.len() + parts.test.len(), matrix.len());
            let mut all: Vec<usize> = parts.train_indices.iter().chain(&parts.test_indices).copied().collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..matrix.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn simulator_never_borrows(
        steps in prop::collection::vec((1.0f64..200.0, 0.5f64..1.5), 1..80),
        cash in 0.0f64..5000.0,
        size in 1u64..20,
        threshold in 0.0f64..0.1,
    ) {
        let pairs: Vec<PredictionPair> = steps
            .iter()
            .enumerate()
            .map(|(i, &(actual, ratio))| PredictionPair {
                date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
                actual,
                predicted: actual * ratio,
            })
            .collect();
        let params = TradingParams {
            initial_cash: cash,
            trade_size: size,
            threshold,
            risk_free_rate: 0.0,
        };
        let result = run_backtest(&pairs, &params);

        prop_assert_eq!(result.snapshots.len(), pairs.len());
        for s in &result.snapshots {
            prop_assert!(s.cash >= 0.0);
            prop_assert_eq!(s.position % size, 0);
            prop_assert_eq!(s.capital, s.cash + s.position as f64 * s.actual_price);
        }
        prop_assert!(result.metrics.max_drawdown_pct >= 0.0);
    }

    #[test]
    fn drawdown_is_bounded(curve in prop::collection::vec(0.01f64..1e6, 0..100)) {
        let dd = max_drawdown(&curve);
        prop_assert!(dd >= 0.0);
        prop_assert!(dd <= 100.0);
    }

    #[test]
    fn constant_curve_has_zero_return(value in 1.0f64..1e6, len in 1usize..50) {
        let curve = vec![value; len];
        prop_assert_eq!(total_return(&curve, value), 0.0);
        prop_assert_eq!(max_drawdown(&curve), 0.0);
    }
}
