use anyhow::{bail, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;

use crate::config::{Bands, PairTradeConfig};
use crate::execution_alert::notify_execution_failure;
use crate::pair::{build_candidates, FittedModel, PairCandidate, PairEvaluator};
use crate::ports::market_feed::{MarketFeed, MarketUpdate};
use crate::selector::{ActivePairSet, PairSelector};
use crate::series::SymbolSeries;
use crate::stats::{EngleGranger, Statistics};
use crate::trade::execution::gateway::{ExecutionError, OrderGateway, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionDirection {
    /// Long A, short B.
    LongSpread,
    /// Short A, long B.
    ShortSpread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadState {
    Flat,
    LongSpread,
    ShortSpread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Reverted,
    StopLoss,
    Deselected,
    /// A lone entry leg that could not be reversed.
    Unhedged,
}

/// Hedge model frozen when a position is opened; exits never see refits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionModel {
    pub intercept: f64,
    pub slope: f64,
    pub mean_error: f64,
    pub epsilon: f64,
}

impl From<&FittedModel> for PositionModel {
    fn from(model: &FittedModel) -> Self {
        Self {
            intercept: model.intercept,
            slope: model.slope,
            mean_error: model.mean_error,
            epsilon: model.epsilon,
        }
    }
}

impl PositionModel {
    pub fn spread(&self, price_a: f64, price_b: f64) -> f64 {
        price_a - (self.intercept + self.slope * price_b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub pair: String,
    pub a: String,
    pub b: String,
    pub direction: PositionDirection,
    /// Signed leg quantities still held.
    pub qty_a: Decimal,
    pub qty_b: Decimal,
    pub entry_price_a: Decimal,
    pub entry_price_b: Decimal,
    pub entered_at: i64,
    pub model: PositionModel,
    /// Set when a close could not flatten both legs; retried every update.
    pub pending_close: Option<CloseReason>,
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegFill {
    pub symbol: String,
    pub requested: Decimal,
    pub filled: Decimal,
    pub price: Decimal,
    /// Signed quantity still held once any reversal ran.
    pub remaining: Decimal,
}

/// Legs of an entry or exit that did not fill together.
#[derive(Debug)]
pub struct PartialFillError {
    pub pair: String,
    pub stage: &'static str,
    pub legs: Vec<LegFill>,
    pub unwound: bool,
    /// PnL of whatever part of the filled legs was already reversed.
    pub realized_pnl: Decimal,
    source: Option<ExecutionError>,
}

impl std::fmt::Display for PartialFillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let legs: Vec<String> = self
            .legs
            .iter()
            .map(|leg| format!("{} {}/{}", leg.symbol, leg.filled, leg.requested))
            .collect();
        write!(
            f,
            "{} legs diverged for {} [{}] unwound={}",
            self.stage,
            self.pair,
            legs.join(", "),
            self.unwound
        )?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl Error for PartialFillError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn Error + 'static))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSummary {
    pub updates: usize,
    pub selections: usize,
    pub opened: usize,
    pub closed_reverted: usize,
    pub closed_stop_loss: usize,
    pub closed_deselected: usize,
    pub closed_unhedged: usize,
    pub execution_failures: usize,
    pub realized_pnl: Decimal,
    pub open_positions: usize,
}

pub fn entry_signal(model: &FittedModel, error: f64, bands: &Bands) -> Option<PositionDirection> {
    let band = bands.open_size * model.epsilon;
    if error < model.mean_error - band {
        Some(PositionDirection::LongSpread)
    } else if error > model.mean_error + band {
        Some(PositionDirection::ShortSpread)
    } else {
        None
    }
}

pub fn exit_signal(
    model: &PositionModel,
    direction: PositionDirection,
    error: f64,
    bands: &Bands,
) -> Option<CloseReason> {
    let mean = model.mean_error;
    let eps = model.epsilon;
    match direction {
        PositionDirection::LongSpread => {
            if error < mean - bands.stop_loss_size * eps {
                Some(CloseReason::StopLoss)
            } else if error > mean - bands.close_size * eps {
                Some(CloseReason::Reverted)
            } else {
                None
            }
        }
        PositionDirection::ShortSpread => {
            if error > mean + bands.stop_loss_size * eps {
                Some(CloseReason::StopLoss)
            } else if error < mean + bands.close_size * eps {
                Some(CloseReason::Reverted)
            } else {
                None
            }
        }
    }
}

pub struct PairTradeEngine {
    cfg: PairTradeConfig,
    bands: Bands,
    gateway: Arc<dyn OrderGateway>,
    series: HashMap<String, SymbolSeries>,
    candidates: Vec<PairCandidate>,
    candidate_index: HashMap<String, usize>,
    selector: PairSelector,
    active: ActivePairSet,
    positions: HashMap<String, OpenPosition>,
    summary: EngineSummary,
    now_ms: Option<i64>,
}

impl PairTradeEngine {
    pub fn new(cfg: PairTradeConfig, gateway: Arc<dyn OrderGateway>) -> Self {
        Self::with_statistics(cfg, gateway, Arc::new(EngleGranger))
    }

    pub fn with_statistics(
        cfg: PairTradeConfig,
        gateway: Arc<dyn OrderGateway>,
        stats: Arc<dyn Statistics>,
    ) -> Self {
        let series = cfg
            .universe
            .iter()
            .map(|symbol| {
                (
                    symbol.clone(),
                    SymbolSeries::new(
                        symbol,
                        cfg.max_bars,
                        cfg.min_ready_bars,
                        cfg.resample_interval,
                    ),
                )
            })
            .collect();
        let candidates = build_candidates(&cfg.universe);
        let candidate_index = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), i))
            .collect();
        let evaluator = PairEvaluator::new(stats, cfg.min_overlap, cfg.coint_p_threshold);
        let selector = PairSelector::new(evaluator, &cfg);
        Self {
            bands: cfg.bands(),
            cfg,
            gateway,
            series,
            candidates,
            candidate_index,
            selector,
            active: ActivePairSet::default(),
            positions: HashMap::new(),
            summary: EngineSummary::default(),
            now_ms: None,
        }
    }

    pub async fn run<F: MarketFeed>(&mut self, feed: &mut F) -> Result<EngineSummary> {
        log::info!(
            "[CONFIG] universe={} pairs={} max_active_pairs={} leverage={} equity={}",
            self.cfg.universe.len(),
            self.candidates.len(),
            self.cfg.max_active_pairs,
            self.cfg.total_leverage,
            self.cfg.equity_usd
        );
        log::info!(
            "[CONFIG] max_bars={} min_ready_bars={} resample_interval={} regenerate_every={}d",
            self.cfg.max_bars,
            self.cfg.min_ready_bars,
            self.cfg.resample_interval,
            self.cfg.regenerate_interval_days
        );
        log::info!(
            "[CONFIG] open={} close={} stop={} min_corr={} coint_p<{} stationary_p<{}",
            self.bands.open_size,
            self.bands.close_size,
            self.bands.stop_loss_size,
            self.cfg.min_corr_threshold,
            self.cfg.coint_p_threshold,
            self.cfg.stationary_p_threshold
        );
        log::info!("[BACKTEST] Running in backtest mode.");

        while let Some(update) = feed.next_update() {
            if let Err(e) = self.step(&update).await {
                log::error!("[BACKTEST] Step failed: {:?}", e);
            }
        }
        log::info!("[BACKTEST] End of data reached. Backtest finished.");

        let summary = self.summary();
        self.log_summary(&summary);
        Ok(summary)
    }

    /// Processes one update: ingest, reselect when due, forced closes,
    /// exits on the frozen model, then entries on the live model.
    pub async fn step(&mut self, update: &MarketUpdate) -> Result<()> {
        if let Some(last) = self.now_ms {
            if update.timestamp <= last {
                bail!(
                    "update ts={} is not after the previous update ts={}",
                    update.timestamp,
                    last
                );
            }
        }
        self.now_ms = Some(update.timestamp);
        self.summary.updates += 1;
        self.gateway.mark_prices(update);

        for (symbol, bar) in &update.bars {
            match self.series.get_mut(symbol) {
                Some(series) => {
                    series.update(*bar);
                }
                None => log::trace!("[SERIES] ignoring bar for {} outside universe", symbol),
            }
        }

        if self.selector.is_due(update.timestamp) {
            if let Some((active, _report)) =
                self.selector
                    .regenerate(update.timestamp, &mut self.candidates, &self.series)
            {
                self.active = active;
                self.summary.selections += 1;
            }
        }

        let mut touched = HashSet::new();
        self.close_deselected(&mut touched).await;
        self.evaluate_exits(&mut touched).await;
        self.evaluate_entries(&touched).await;
        Ok(())
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            open_positions: self.positions.len(),
            ..self.summary.clone()
        }
    }

    pub fn active_pairs(&self) -> &ActivePairSet {
        &self.active
    }

    pub fn position(&self, pair: &str) -> Option<&OpenPosition> {
        self.positions.get(pair)
    }

    pub fn state_of(&self, pair: &str) -> SpreadState {
        match self.positions.get(pair).map(|p| p.direction) {
            None => SpreadState::Flat,
            Some(PositionDirection::LongSpread) => SpreadState::LongSpread,
            Some(PositionDirection::ShortSpread) => SpreadState::ShortSpread,
        }
    }

    fn latest_prices(&self, a: &str, b: &str) -> Option<(f64, f64)> {
        let price_a = self.series.get(a)?.last_close()?;
        let price_b = self.series.get(b)?.last_close()?;
        Some((price_a, price_b))
    }

    fn sorted_position_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.positions.keys().cloned().collect();
        names.sort();
        names
    }

    async fn close_deselected(&mut self, touched: &mut HashSet<String>) {
        for name in self.sorted_position_names() {
            let reason = match self.positions.get(&name) {
                Some(pos) => match pos.pending_close {
                    Some(reason) => reason,
                    None if !self.active.contains(&name) => CloseReason::Deselected,
                    None => continue,
                },
                None => continue,
            };
            if reason == CloseReason::Deselected {
                log::info!("[FORCE_CLOSE] {} no longer selected", name);
            } else {
                log::info!("[FORCE_CLOSE] {} retrying close reason={:?}", name, reason);
            }
            touched.insert(name.clone());
            self.close_position(&name, reason).await;
        }
    }

    async fn evaluate_exits(&mut self, touched: &mut HashSet<String>) {
        for name in self.sorted_position_names() {
            if touched.contains(&name) {
                continue;
            }
            let Some(pos) = self.positions.get(&name) else {
                continue;
            };
            let Some((price_a, price_b)) = self.latest_prices(&pos.a, &pos.b) else {
                continue;
            };
            let error = pos.model.spread(price_a, price_b);
            match exit_signal(&pos.model, pos.direction, error, &self.bands) {
                Some(reason) => {
                    touched.insert(name.clone());
                    self.close_position(&name, reason).await;
                }
                None => log::debug!(
                    "[EXIT_CHECK] {} {:?} error={:.4} mean={:.4} eps={:.4}",
                    name,
                    pos.direction,
                    error,
                    pos.model.mean_error,
                    pos.model.epsilon
                ),
            }
        }
    }

    async fn evaluate_entries(&mut self, touched: &HashSet<String>) {
        let names: Vec<String> = self.active.names().to_vec();
        for name in names {
            if touched.contains(&name) || self.positions.contains_key(&name) {
                continue;
            }
            let Some(&index) = self.candidate_index.get(&name) else {
                continue;
            };
            let candidate = &self.candidates[index];
            let Some(model) = candidate.model().copied() else {
                continue;
            };
            if !(model.epsilon > 0.0) || !model.epsilon.is_finite() {
                log::debug!(
                    "[ENTRY] {} skipped: degenerate model eps={}",
                    name,
                    model.epsilon
                );
                continue;
            }
            let (a, b) = (candidate.a.clone(), candidate.b.clone());
            let Some((price_a, price_b)) = self.latest_prices(&a, &b) else {
                continue;
            };
            let error = model.spread(price_a, price_b);
            if let Some(direction) = entry_signal(&model, error, &self.bands) {
                log::debug!(
                    "[EVAL] {} {:?} signal error={:.4} mean={:.4} eps={:.4}",
                    name,
                    direction,
                    error,
                    model.mean_error,
                    model.epsilon
                );
                self.open_position(&name, &a, &b, direction, &model, price_a, price_b)
                    .await;
            }
        }
    }

    /// Per-leg size: equity times `total_leverage / active / 2`, floored to
    /// `size_decimals`.
    fn leg_quantity(&self, price: f64) -> Decimal {
        let active = self.active.len().max(1) as f64;
        let fraction = self.cfg.total_leverage / active / 2.0;
        let (Some(fraction), Some(price)) = (Decimal::from_f64(fraction), Decimal::from_f64(price))
        else {
            return Decimal::ZERO;
        };
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.cfg.equity_usd * fraction / price)
            .round_dp_with_strategy(self.cfg.size_decimals, RoundingStrategy::ToZero)
    }

    #[allow(clippy::too_many_arguments)]
    async fn open_position(
        &mut self,
        name: &str,
        a: &str,
        b: &str,
        direction: PositionDirection,
        model: &FittedModel,
        price_a: f64,
        price_b: f64,
    ) {
        let size_a = self.leg_quantity(price_a);
        let size_b = self.leg_quantity(price_b);
        if size_a.is_zero() || size_b.is_zero() {
            log::debug!(
                "[ENTRY] {} skipped: zero size (size_a={} size_b={})",
                name,
                size_a,
                size_b
            );
            return;
        }
        let (qty_a, qty_b) = match direction {
            PositionDirection::LongSpread => (size_a, -size_b),
            PositionDirection::ShortSpread => (-size_a, size_b),
        };

        match self.place_pair(name, "entry", a, qty_a, b, qty_b).await {
            Ok((ticket_a, ticket_b)) => {
                let position = OpenPosition {
                    pair: name.to_string(),
                    a: a.to_string(),
                    b: b.to_string(),
                    direction,
                    qty_a: ticket_a.filled_quantity,
                    qty_b: ticket_b.filled_quantity,
                    entry_price_a: ticket_a.avg_price,
                    entry_price_b: ticket_b.avg_price,
                    entered_at: self.now_ms.unwrap_or_default(),
                    model: PositionModel::from(model),
                    pending_close: None,
                    realized_pnl: Decimal::ZERO,
                };
                log::info!(
                    "[ENTRY] pair={} direction={:?} qty_a={} price_a={} qty_b={} price_b={} error={:.4} mean={:.4} eps={:.4} ts={}",
                    name,
                    direction,
                    position.qty_a,
                    position.entry_price_a,
                    position.qty_b,
                    position.entry_price_b,
                    model.spread(price_a, price_b),
                    model.mean_error,
                    model.epsilon,
                    position.entered_at
                );
                self.positions.insert(name.to_string(), position);
                self.summary.opened += 1;
            }
            Err(err) => {
                self.keep_unhedged(name, direction, model, &err);
                self.escalate(err);
            }
        }
    }

    /// Tracks legs a failed entry could not reverse, so the pair blocks new
    /// entries and the close is retried first on every update.
    fn keep_unhedged(
        &mut self,
        name: &str,
        direction: PositionDirection,
        model: &FittedModel,
        err: &PartialFillError,
    ) {
        let (Some(leg_a), Some(leg_b)) = (err.legs.first(), err.legs.get(1)) else {
            return;
        };
        if leg_a.remaining.is_zero() && leg_b.remaining.is_zero() {
            self.summary.realized_pnl += err.realized_pnl;
            return;
        }
        log::error!(
            "[UNHEDGED] {} holding {} {} and {} {} until the close succeeds",
            name,
            leg_a.symbol,
            leg_a.remaining,
            leg_b.symbol,
            leg_b.remaining
        );
        self.positions.insert(
            name.to_string(),
            OpenPosition {
                pair: name.to_string(),
                a: leg_a.symbol.clone(),
                b: leg_b.symbol.clone(),
                direction,
                qty_a: leg_a.remaining,
                qty_b: leg_b.remaining,
                entry_price_a: leg_a.price,
                entry_price_b: leg_b.price,
                entered_at: self.now_ms.unwrap_or_default(),
                model: PositionModel::from(model),
                pending_close: Some(CloseReason::Unhedged),
                realized_pnl: err.realized_pnl,
            },
        );
    }

    /// Submits both legs; a lone or partial fill is reversed before
    /// returning the error.
    async fn place_pair(
        &self,
        pair: &str,
        stage: &'static str,
        a: &str,
        qty_a: Decimal,
        b: &str,
        qty_b: Decimal,
    ) -> Result<(Ticket, Ticket), PartialFillError> {
        let res_a = self.gateway.submit_market_order(a, qty_a).await;
        let ticket_a = match res_a {
            Ok(ticket) if ticket.is_fully_filled() => ticket,
            other => {
                let (filled_a, price_a, source) = split_result(other);
                let (remaining_a, realized) = self.unwind(pair, a, filled_a, price_a).await;
                return Err(PartialFillError {
                    pair: pair.to_string(),
                    stage,
                    legs: vec![
                        LegFill {
                            symbol: a.to_string(),
                            requested: qty_a,
                            filled: filled_a,
                            price: price_a,
                            remaining: remaining_a,
                        },
                        LegFill {
                            symbol: b.to_string(),
                            requested: qty_b,
                            filled: Decimal::ZERO,
                            price: Decimal::ZERO,
                            remaining: Decimal::ZERO,
                        },
                    ],
                    unwound: remaining_a.is_zero(),
                    realized_pnl: realized,
                    source,
                });
            }
        };

        let res_b = self.gateway.submit_market_order(b, qty_b).await;
        match res_b {
            Ok(ticket_b) if ticket_b.is_fully_filled() => Ok((ticket_a, ticket_b)),
            other => {
                let (filled_b, price_b, source) = split_result(other);
                let (remaining_a, realized_a) = self
                    .unwind(pair, a, ticket_a.filled_quantity, ticket_a.avg_price)
                    .await;
                let (remaining_b, realized_b) = self.unwind(pair, b, filled_b, price_b).await;
                Err(PartialFillError {
                    pair: pair.to_string(),
                    stage,
                    legs: vec![
                        LegFill {
                            symbol: a.to_string(),
                            requested: qty_a,
                            filled: ticket_a.filled_quantity,
                            price: ticket_a.avg_price,
                            remaining: remaining_a,
                        },
                        LegFill {
                            symbol: b.to_string(),
                            requested: qty_b,
                            filled: filled_b,
                            price: price_b,
                            remaining: remaining_b,
                        },
                    ],
                    unwound: remaining_a.is_zero() && remaining_b.is_zero(),
                    realized_pnl: realized_a + realized_b,
                    source,
                })
            }
        }
    }

    /// Flattens a lone filled leg with an opposite market order. Returns the
    /// quantity still held and the PnL of the part that was reversed.
    async fn unwind(
        &self,
        pair: &str,
        symbol: &str,
        filled: Decimal,
        fill_price: Decimal,
    ) -> (Decimal, Decimal) {
        if filled.is_zero() {
            return (Decimal::ZERO, Decimal::ZERO);
        }
        log::warn!(
            "[UNHEDGED] {} closing lone leg symbol={} filled={}",
            pair,
            symbol,
            filled
        );
        match self.gateway.submit_market_order(symbol, -filled).await {
            Ok(ticket) => {
                let remaining = filled + ticket.filled_quantity;
                if !remaining.is_zero() {
                    log::error!(
                        "[UNHEDGED] {} lone leg {} only partially closed {}/{}",
                        pair,
                        symbol,
                        ticket.filled_quantity,
                        -filled
                    );
                }
                let realized = -ticket.filled_quantity * (ticket.avg_price - fill_price);
                (remaining, realized)
            }
            Err(err) => {
                log::error!(
                    "[UNHEDGED] {} failed to close lone leg {}: {}",
                    pair,
                    symbol,
                    err
                );
                (filled, Decimal::ZERO)
            }
        }
    }

    /// Flattens both legs of `name`. Legs that fail stay on the position and
    /// the close is retried on the next update. No-op for a flat pair.
    pub(crate) async fn close_position(&mut self, name: &str, reason: CloseReason) {
        let Some(pos) = self.positions.get(name).cloned() else {
            return;
        };

        let mut legs = Vec::new();
        let mut source = None;
        let mut remaining = [
            (pos.a.clone(), pos.qty_a, pos.entry_price_a),
            (pos.b.clone(), pos.qty_b, pos.entry_price_b),
        ];
        let mut realized = Decimal::ZERO;
        let mut exit_prices = [None, None];

        for (i, (symbol, held, entry_price)) in remaining.iter_mut().enumerate() {
            if held.is_zero() {
                continue;
            }
            let requested = -*held;
            let (filled, price, err) =
                split_result(self.gateway.submit_market_order(symbol, requested).await);
            if err.is_some() {
                source = err;
            }
            let price = (!filled.is_zero()).then_some(price);
            if let Some(price) = price {
                // closing `filled` removes `-filled` from the position
                realized += -filled * (price - *entry_price);
                exit_prices[i] = Some(price);
            }
            *held += filled;
            legs.push(LegFill {
                symbol: symbol.clone(),
                requested,
                filled,
                price: price.unwrap_or_default(),
                remaining: *held,
            });
        }

        let Some(pos_mut) = self.positions.get_mut(name) else {
            return;
        };
        pos_mut.qty_a = remaining[0].1;
        pos_mut.qty_b = remaining[1].1;
        pos_mut.realized_pnl += realized;

        if pos_mut.qty_a.is_zero() && pos_mut.qty_b.is_zero() {
            let pnl = pos_mut.realized_pnl;
            self.positions.remove(name);
            self.summary.realized_pnl += pnl;
            match reason {
                CloseReason::Reverted => self.summary.closed_reverted += 1,
                CloseReason::StopLoss => self.summary.closed_stop_loss += 1,
                CloseReason::Deselected => self.summary.closed_deselected += 1,
                CloseReason::Unhedged => self.summary.closed_unhedged += 1,
            }
            log::info!(
                "[EXIT] pair={} direction={:?} reason={:?} price_a={} price_b={} pnl={} ts={}",
                name,
                pos.direction,
                reason,
                display_price(exit_prices[0]),
                display_price(exit_prices[1]),
                pnl.round_dp(2),
                self.now_ms.unwrap_or_default()
            );
        } else {
            pos_mut.pending_close = Some(reason);
            let err = PartialFillError {
                pair: name.to_string(),
                stage: "exit",
                legs,
                unwound: false,
                realized_pnl: realized,
                source,
            };
            self.escalate(err);
        }
    }

    fn escalate(&mut self, err: PartialFillError) {
        self.summary.execution_failures += 1;
        log::error!("[ORDER] execution failure: {}", err);
        notify_execution_failure(&format!("{} {}", err.stage, err.pair), &err.to_string());
    }

    fn log_summary(&self, summary: &EngineSummary) {
        log::info!(
            "[SUMMARY] updates={} selections={} opened={} closed_reverted={} closed_stop_loss={} closed_deselected={} closed_unhedged={} execution_failures={} realized_pnl={} open_positions={}",
            summary.updates,
            summary.selections,
            summary.opened,
            summary.closed_reverted,
            summary.closed_stop_loss,
            summary.closed_deselected,
            summary.closed_unhedged,
            summary.execution_failures,
            summary.realized_pnl.round_dp(2),
            summary.open_positions
        );
        for name in self.sorted_position_names() {
            if let Some(pos) = self.positions.get(&name) {
                log::info!(
                    "[SUMMARY] still open pair={} direction={:?} qty_a={} qty_b={} entered_at={}",
                    name,
                    pos.direction,
                    pos.qty_a,
                    pos.qty_b,
                    pos.entered_at
                );
            }
        }
    }
}

fn split_result(
    result: Result<Ticket, ExecutionError>,
) -> (Decimal, Decimal, Option<ExecutionError>) {
    match result {
        Ok(ticket) => (ticket.filled_quantity, ticket.avg_price, None),
        Err(err) => (Decimal::ZERO, Decimal::ZERO, Some(err)),
    }
}

fn display_price(price: Option<Decimal>) -> String {
    price
        .and_then(|p| p.to_f64())
        .map(|p| format!("{:.4}", p))
        .unwrap_or_else(|| "-".to_string())
}
