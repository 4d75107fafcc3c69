//! Price data access port trait.

use crate::domain::error::LagcastError;
use crate::domain::price::PriceSeries;

/// One entry per stored symbol: a validated series, or the reason its rows
/// could not form one.
pub type LoadedSeries = Result<PriceSeries, LagcastError>;

/// Loads close-price histories.
pub trait PriceLoader {
    /// Every symbol stored in `table`, sorted by symbol. A symbol with
    /// duplicated dates or non-finite closes comes back as its own `Err`
    /// entry; the outer `Err` is reserved for failures of the whole table.
    fn load_prices(&self, table: &str) -> Result<Vec<LoadedSeries>, LagcastError>;

    fn list_symbols(&self, table: &str) -> Result<Vec<String>, LagcastError>;
}
