//! Closing-price series for a single symbol.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::error::LagcastError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronologically ordered closes for one symbol. Dates strictly increase.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting out-of-order or duplicated dates and
    /// non-finite closes.
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, LagcastError> {
        let symbol = symbol.into();

        for (i, point) in points.iter().enumerate() {
            if !point.close.is_finite() {
                return Err(LagcastError::InvalidSeries {
                    symbol,
                    reason: format!("non-finite close on {}", point.date),
                });
            }
            if i > 0 && points[i - 1].date >= point.date {
                return Err(LagcastError::InvalidSeries {
                    symbol,
                    reason: format!(
                        "dates not strictly increasing at {} (after {})",
                        point.date,
                        points[i - 1].date
                    ),
                });
            }
        }

        Ok(PriceSeries { symbol, points })
    }

    /// Convenience constructor for consecutive calendar days starting at `start`.
    pub fn from_closes(
        symbol: impl Into<String>,
        start: NaiveDate,
        closes: &[f64],
    ) -> Result<Self, LagcastError> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect();
        Self::new(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Group loose `(symbol, point)` rows into one series per symbol, sorted by
/// symbol with each series sorted by date. Symbols whose rows do not form a
/// valid series come back as errors alongside the good ones.
pub fn group_by_symbol<I>(rows: I) -> Vec<Result<PriceSeries, LagcastError>>
where
    I: IntoIterator<Item = (String, PricePoint)>,
{
    let mut grouped: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    for (symbol, point) in rows {
        grouped.entry(symbol).or_default().push(point);
    }

    grouped
        .into_iter()
        .map(|(symbol, mut points)| {
            points.sort_by_key(|p| p.date);
            PriceSeries::new(symbol, points)
        })
        .collect()
}
