//! Lagged feature windows over a close-price series.
//!
//! Row `t` (for `lag_days <= t <= len - 2`) holds `lag_i = close[t - i]` for
//! `i = 1..=lag_days` and `target = close[t]`. Rows lacking a full lag history
//! are dropped, never imputed, and the final close is left out so that it can
//! seed the forecast window.

use chrono::NaiveDate;

use super::error::LagcastError;
use super::price::PriceSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// `lags[0]` is `lag_1`, the most recent close before the target.
    pub lags: Vec<f64>,
    pub target: f64,
    pub target_date: NaiveDate,
}

impl FeatureRow {
    pub fn lag(&self, i: usize) -> Option<f64> {
        i.checked_sub(1).and_then(|idx| self.lags.get(idx)).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub symbol: String,
    pub lag_days: usize,
    pub rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_names(&self) -> Vec<String> {
        (1..=self.lag_days).map(|i| format!("lag_{i}")).collect()
    }
}

/// Number of rows a series of `len` closes yields with `lag_days` lags.
pub fn expected_rows(len: usize, lag_days: usize) -> usize {
    len.saturating_sub(lag_days + 1)
}

pub fn build_feature_matrix(
    series: &PriceSeries,
    lag_days: usize,
) -> Result<FeatureMatrix, LagcastError> {
    if lag_days == 0 {
        return Err(LagcastError::invalid(
            "pipeline",
            "lag_days",
            "lag_days must be at least 1",
        ));
    }

    let points = series.points();
    let rows: Vec<FeatureRow> = if points.len() < lag_days + 2 {
        Vec::new()
    } else {
        (lag_days..=points.len() - 2)
            .map(|t| FeatureRow {
                lags: (1..=lag_days).map(|i| points[t - i].close).collect(),
                target: points[t].close,
                target_date: points[t].date,
            })
            .collect()
    };

    if rows.is_empty() {
        return Err(LagcastError::InsufficientData {
            symbol: series.symbol().to_string(),
            rows: 0,
            minimum: 1,
        });
    }

    Ok(FeatureMatrix {
        symbol: series.symbol().to_string(),
        lag_days,
        rows,
    })
}

/// Fixed-size window of the most recent closes, `lag_1` first.
#[derive(Debug, Clone, PartialEq)]
pub struct LagWindow {
    values: Vec<f64>,
}

impl LagWindow {
    /// Window over `values`, which must already be ordered most recent first.
    pub fn new(values: Vec<f64>) -> Self {
        LagWindow { values }
    }

    /// The last `lag_days` closes of `series`, most recent first.
    pub fn latest(series: &PriceSeries, lag_days: usize) -> Result<Self, LagcastError> {
        let points = series.points();
        if lag_days == 0 || points.len() < lag_days {
            return Err(LagcastError::InsufficientData {
                symbol: series.symbol().to_string(),
                rows: points.len(),
                minimum: lag_days.max(1),
            });
        }
        let values = points.iter().rev().take(lag_days).map(|p| p.close).collect();
        Ok(LagWindow { values })
    }

    /// Shift every lag back by one step and make `value` the new `lag_1`.
    pub fn push(&mut self, value: f64) {
        if self.values.is_empty() {
            return;
        }
        self.values.pop();
        self.values.insert(0, value);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes("TEST", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), closes)
            .unwrap()
    }

    #[test]
    fn builds_rows_in_order() {
        let s = series(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        let matrix = build_feature_matrix(&s, 2).unwrap();

        assert_eq!(matrix.len(), 4);
        let rows: Vec<(f64, f64, f64)> = matrix
            .rows
            .iter()
            .map(|r| (r.lags[0], r.lags[1], r.target))
            .collect();
        assert_eq!(
            rows,
            vec![
                (11.0, 10.0, 12.0),
                (12.0, 11.0, 13.0),
                (13.0, 12.0, 14.0),
                (14.0, 13.0, 15.0),
            ]
        );
        assert_eq!(
            matrix.rows[0].target_date,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
    }

    #[test]
    fn lag_accessor_is_one_based() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let matrix = build_feature_matrix(&s, 3).unwrap();
        let row = &matrix.rows[0];
        assert_eq!(row.lag(1), Some(3.0));
        assert_eq!(row.lag(3), Some(1.0));
        assert_eq!(row.lag(0), None);
        assert_eq!(row.lag(4), None);
    }

    #[test]
    fn minimum_length_yields_one_row() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let matrix = build_feature_matrix(&s, 2).unwrap();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.rows[0].target, 3.0);
    }

    #[test]
    fn too_short_is_insufficient_data() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = build_feature_matrix(&s, 2).unwrap_err();
        assert!(matches!(err, LagcastError::InsufficientData { rows: 0, .. }));
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let s = series(&[]);
        assert!(matches!(
            build_feature_matrix(&s, 1),
            Err(LagcastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn zero_lag_days_rejected() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            build_feature_matrix(&s, 0),
            Err(LagcastError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn expected_rows_saturates() {
        assert_eq!(expected_rows(7, 2), 4);
        assert_eq!(expected_rows(3, 2), 0);
        assert_eq!(expected_rows(0, 5), 0);
    }

    #[test]
    fn feature_names() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let matrix = build_feature_matrix(&s, 3).unwrap();
        assert_eq!(matrix.feature_names(), vec!["lag_1", "lag_2", "lag_3"]);
    }

    #[test]
    fn window_latest_most_recent_first() {
        let s = series(&[10.0, 11.0, 12.0, 13.0]);
        let window = LagWindow::latest(&s, 3).unwrap();
        assert_eq!(window.values(), &[13.0, 12.0, 11.0]);
    }

    #[test]
    fn window_push_shifts_and_drops_oldest() {
        let mut window = LagWindow::new(vec![13.0, 12.0, 11.0]);
        window.push(14.5);
        assert_eq!(window.values(), &[14.5, 13.0, 12.0]);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn window_clone_is_independent() {
        let original = LagWindow::new(vec![2.0, 1.0]);
        let mut copy = original.clone();
        copy.push(3.0);
        assert_eq!(original.values(), &[2.0, 1.0]);
        assert_eq!(copy.values(), &[3.0, 2.0]);
    }

    #[test]
    fn window_latest_too_short() {
        let s = series(&[1.0]);
        assert!(LagWindow::latest(&s, 2).is_err());
    }
}
