use async_trait::async_trait;
use lazy_static::lazy_static;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use super::gateway::{ExecutionError, OrderGateway, Ticket};
use crate::ports::market_feed::MarketUpdate;

lazy_static! {
    static ref FILLED_PROBABILITY_IN_EMULATION: Decimal = {
        match env::var("FILLED_PROBABILITY_IN_EMULATION") {
            Ok(val) => val.parse::<Decimal>().unwrap_or(Decimal::new(1, 0)),
            Err(_) => Decimal::new(1, 0),
        }
    };
}

/// Simulated broker filling market orders at the last marked close.
pub struct PaperGateway {
    marks: Mutex<HashMap<String, Decimal>>,
    fill_probability: Decimal,
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::with_fill_probability(*FILLED_PROBABILITY_IN_EMULATION)
    }

    pub fn with_fill_probability(fill_probability: Decimal) -> Self {
        Self {
            marks: Mutex::new(HashMap::new()),
            fill_probability,
        }
    }

    pub fn set_mark(&self, symbol: &str, price: Decimal) {
        if let Ok(mut marks) = self.marks.lock() {
            marks.insert(symbol.to_string(), price);
        }
    }

    pub fn mark(&self, symbol: &str) -> Option<Decimal> {
        self.marks.lock().ok()?.get(symbol).copied()
    }

    fn fills(&self) -> bool {
        if self.fill_probability >= Decimal::ONE {
            return true;
        }
        let p = self.fill_probability.to_f64().unwrap_or(1.0);
        rand::random::<f64>() < p
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_market_order(
        &self,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Ticket, ExecutionError> {
        if quantity.is_zero() {
            return Err(ExecutionError::Rejected {
                symbol: symbol.to_string(),
                reason: "zero quantity".to_string(),
            });
        }
        let price = self
            .mark(symbol)
            .ok_or_else(|| ExecutionError::UnknownSymbol(symbol.to_string()))?;
        if !self.fills() {
            return Err(ExecutionError::Unfilled {
                symbol: symbol.to_string(),
                quantity,
            });
        }

        log::info!(
            "[BACKTEST_FILL] symbol={}, qty={}, price={}",
            symbol,
            quantity,
            price
        );
        Ok(Ticket {
            id: rand::random::<u64>().to_string(),
            symbol: symbol.to_string(),
            requested_quantity: quantity,
            filled_quantity: quantity,
            avg_price: price,
        })
    }

    fn mark_prices(&self, update: &MarketUpdate) {
        for (symbol, bar) in &update.bars {
            match Decimal::from_f64(bar.close) {
                Some(price) if price > Decimal::ZERO => self.set_mark(symbol, price),
                _ => log::debug!("[ORDER] ignoring unusable mark {} for {}", bar.close, symbol),
            }
        }
    }
}
