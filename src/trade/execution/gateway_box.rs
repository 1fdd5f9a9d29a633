use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::gateway::{ExecutionError, OrderGateway, Ticket};
use super::paper_gateway::PaperGateway;
use crate::ports::market_feed::MarketUpdate;

pub struct GatewayBox {
    pub inner: Box<dyn OrderGateway>,
    failures: AtomicUsize,
}

impl GatewayBox {
    pub fn new(inner: Box<dyn OrderGateway>) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn create(gateway_name: &str, dry_run: bool) -> Result<Self> {
        match gateway_name {
            "paper" => {
                if !dry_run {
                    log::warn!("[ORDER] paper gateway selected with dry_run=false; orders stay simulated");
                }
                Ok(Self::new(Box::new(PaperGateway::new())))
            }
            _ => Err(anyhow!("Unsupported gateway: {}", gateway_name)),
        }
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Operator alerts are raised by the engine, which knows the pair.
    fn report_failure(&self, operation: &str, detail: &str, err: &ExecutionError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        log::warn!("[ORDER] {} failed ({}): {}", operation, detail, err);
    }
}

#[async_trait]
impl OrderGateway for GatewayBox {
    async fn submit_market_order(
        &self,
        symbol: &str,
        quantity: Decimal,
    ) -> Result<Ticket, ExecutionError> {
        log::debug!("[ORDER] submit {} qty={}", symbol, quantity);
        let result = self.inner.submit_market_order(symbol, quantity).await;
        match &result {
            Ok(ticket) => {
                log::debug!(
                    "[ORDER] ticket {} {} filled={}/{} avg={}",
                    ticket.id,
                    symbol,
                    ticket.filled_quantity,
                    ticket.requested_quantity,
                    ticket.avg_price
                );
            }
            Err(err) => {
                self.report_failure(
                    "submit_market_order",
                    &format!("{} | qty={}", symbol, quantity),
                    err,
                );
            }
        }
        result
    }

    fn mark_prices(&self, update: &MarketUpdate) {
        self.inner.mark_prices(update);
    }
}
