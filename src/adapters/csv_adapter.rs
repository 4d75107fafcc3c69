//! CSV file price adapter.
//!
//! Reads `<base_path>/<table>.csv` with a `date,symbol,close` header. Rows may
//! appear in any order; they are grouped per symbol and sorted by date.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::domain::error::LagcastError;
use crate::domain::price::{PricePoint, group_by_symbol};
use crate::ports::data_port::{LoadedSeries, PriceLoader};

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: String,
    symbol: String,
    close: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, table: &str) -> PathBuf {
        self.base_path.join(format!("{table}.csv"))
    }

    fn read_rows(&self, table: &str) -> Result<Vec<(String, PricePoint)>, LagcastError> {
        let path = self.csv_path(table);
        let content = fs::read_to_string(&path).map_err(|e| LagcastError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for (line, result) in rdr.deserialize::<PriceRow>().enumerate() {
            let row = result.map_err(|e| LagcastError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                LagcastError::Database {
                    reason: format!("invalid date '{}' on row {}: {}", row.date, line + 1, e),
                }
            })?;
            rows.push((row.symbol.to_uppercase(), PricePoint { date, close: row.close }));
        }

        debug!(path = %path.display(), rows = rows.len(), "read price rows");
        Ok(rows)
    }
}

impl PriceLoader for CsvAdapter {
    fn load_prices(&self, table: &str) -> Result<Vec<LoadedSeries>, LagcastError> {
        Ok(group_by_symbol(self.read_rows(table)?))
    }

    fn list_symbols(&self, table: &str) -> Result<Vec<String>, LagcastError> {
        let symbols: BTreeSet<String> = self
            .read_rows(table)?
            .into_iter()
            .map(|(symbol, _)| symbol)
            .collect();
        Ok(symbols.into_iter().collect())
    }
}
