use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;

use crate::ports::market_feed::MarketUpdate;

/// Outcome of a market order. Quantities are signed: positive buys.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub symbol: String,
    pub requested_quantity: Decimal,
    pub filled_quantity: Decimal,
    pub avg_price: Decimal,
}

impl Ticket {
    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity == self.requested_quantity
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionError {
    Rejected { symbol: String, reason: String },
    Unfilled { symbol: String, quantity: Decimal },
    UnknownSymbol(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionError::Rejected { symbol, reason } => {
                write!(f, "order for {} rejected: {}", symbol, reason)
            }
            ExecutionError::Unfilled { symbol, quantity } => {
                write!(f, "order for {} qty={} was not filled", symbol, quantity)
            }
            ExecutionError::UnknownSymbol(symbol) => write!(f, "no price for symbol {}", symbol),
        }
    }
}

impl std::error::Error for ExecutionError {}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_market_order(
        &self,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Ticket, ExecutionError>;

    /// Called with every update before the engine trades on it.
    fn mark_prices(&self, _update: &MarketUpdate) {}
}
