//! Cash and share position for a single-symbol, long-only portfolio.

/// Why a requested trade did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSkipped {
    InsufficientCash,
    InsufficientPosition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub position: u64,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        PortfolioState {
            cash: initial_cash,
            position: 0,
        }
    }

    pub fn capital(&self, price: f64) -> f64 {
        self.cash + self.position as f64 * price
    }

    /// Buy `quantity` whole shares at `price` if cash covers the full lot.
    pub fn try_buy(&mut self, quantity: u64, price: f64) -> Result<(), TradeSkipped> {
        let cost = quantity as f64 * price;
        if self.cash < cost {
            return Err(TradeSkipped::InsufficientCash);
        }
        self.cash -= cost;
        self.position += quantity;
        Ok(())
    }

    /// Sell `quantity` shares at `price` if that many are held.
    pub fn try_sell(&mut self, quantity: u64, price: f64) -> Result<(), TradeSkipped> {
        if self.position < quantity {
            return Err(TradeSkipped::InsufficientPosition);
        }
        self.cash += quantity as f64 * price;
        self.position -= quantity;
        Ok(())
    }
}
