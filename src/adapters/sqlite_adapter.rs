//! SQLite price adapter.
//!
//! Prices live in a `(symbol, date, close)` table whose name comes from
//! configuration. The name is checked as a plain identifier before being
//! spliced into SQL since table names cannot be bound as parameters.

use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

use crate::domain::config_validation::is_identifier;
use crate::domain::error::LagcastError;
use crate::domain::price::{PricePoint, PriceSeries, group_by_symbol};
use crate::ports::data_port::{LoadedSeries, PriceLoader};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> LagcastError {
    LagcastError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> LagcastError {
    LagcastError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn checked_table(table: &str) -> Result<&str, LagcastError> {
    if is_identifier(table) {
        Ok(table)
    } else {
        Err(LagcastError::invalid(
            "data",
            "table",
            format!("'{table}' is not a valid table name"),
        ))
    }
}

impl SqliteAdapter {
    pub fn open(path: &str, pool_size: u32) -> Result<Self, LagcastError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LagcastError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn initialize_table(&self, table: &str) -> Result<(), LagcastError> {
        let table = checked_table(table)?;
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_symbol ON {table}(symbol);"
        ))
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_prices(&self, table: &str, series: &PriceSeries) -> Result<(), LagcastError> {
        let table = checked_table(table)?;
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR REPLACE INTO {table} (symbol, date, close) VALUES (?1, ?2, ?3)"
                ))
                .map_err(query_error)?;
            for point in series.points() {
                stmt.execute(params![
                    series.symbol(),
                    point.date.format("%Y-%m-%d").to_string(),
                    point.close
                ])
                .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)?;
        debug!(symbol = series.symbol(), rows = series.len(), table, "inserted prices");
        Ok(())
    }
}

impl PriceLoader for SqliteAdapter {
    fn load_prices(&self, table: &str) -> Result<Vec<LoadedSeries>, LagcastError> {
        let table = checked_table(table)?;
        let conn = self.pool.get().map_err(pool_error)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT symbol, date, close FROM {table} ORDER BY symbol ASC, date ASC"
            ))
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                let date_str: String = row.get(1)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        date_str.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok((
                    symbol,
                    PricePoint {
                        date,
                        close: row.get(2)?,
                    },
                ))
            })
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_error)?);
        }

        Ok(group_by_symbol(points))
    }

    fn list_symbols(&self, table: &str) -> Result<Vec<String>, LagcastError> {
        let table = checked_table(table)?;
        let conn = self.pool.get().map_err(pool_error)?;

        let mut stmt = conn
            .prepare(&format!("SELECT DISTINCT symbol FROM {table} ORDER BY symbol"))
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }
        Ok(symbols)
    }
}
