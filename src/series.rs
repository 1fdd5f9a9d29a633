use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar close time in unix milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn from_close(timestamp: i64, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub ts: i64,
    pub close: f64,
}

/// Bounded close history for one instrument, oldest bar first.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    symbol: String,
    bars: VecDeque<Bar>,
    max_bars: usize,
    min_ready_bars: usize,
    resample_interval: usize,
}

impl SymbolSeries {
    pub fn new(
        symbol: &str,
        max_bars: usize,
        min_ready_bars: usize,
        resample_interval: usize,
    ) -> Self {
        let max_bars = max_bars.max(1);
        Self {
            symbol: symbol.to_string(),
            bars: VecDeque::with_capacity(max_bars.min(4096)),
            max_bars,
            min_ready_bars: min_ready_bars.min(max_bars),
            resample_interval: resample_interval.max(1),
        }
    }

    pub fn resample_interval(&self) -> usize {
        self.resample_interval
    }

    /// Appends a bar, evicting the oldest once the window is full.
    /// Returns false when the bar is not newer than the last one held.
    pub fn update(&mut self, bar: Bar) -> bool {
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                log::debug!(
                    "[SERIES] {} ignoring out-of-order bar ts={} last={}",
                    self.symbol,
                    bar.timestamp,
                    last.timestamp
                );
                return false;
            }
        }
        if !bar.close.is_finite() || bar.close <= 0.0 {
            log::debug!(
                "[SERIES] {} ignoring invalid close {} at ts={}",
                self.symbol,
                bar.close,
                bar.timestamp
            );
            return false;
        }
        if self.bars.len() >= self.max_bars {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        true
    }

    pub fn is_ready(&self) -> bool {
        !self.bars.is_empty() && self.bars.len() >= self.min_ready_bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.back().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<PriceSample> {
        self.bars
            .iter()
            .map(|b| PriceSample {
                ts: b.timestamp,
                close: b.close,
            })
            .collect()
    }
}

/// Inner join of two oldest-first series on timestamp.
pub fn synchronize(a: &[PriceSample], b: &[PriceSample]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(a.len().min(b.len()));
    let mut ys = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].ts.cmp(&b[j].ts) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(a[i].close);
                ys.push(b[j].close);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Joins on timestamp first, then keeps every `interval`-th joined row counted
/// back from the newest shared row. A bar missing from one side only drops
/// that row and leaves older rows in phase.
pub fn synchronize_resampled(
    a: &[PriceSample],
    b: &[PriceSample],
    interval: usize,
) -> (Vec<f64>, Vec<f64>) {
    let (xa, xb) = synchronize(a, b);
    let interval = interval.max(1);
    let keep = |xs: Vec<f64>| -> Vec<f64> {
        let mut out: Vec<f64> = xs.into_iter().rev().step_by(interval).collect();
        out.reverse();
        out
    };
    (keep(xa), keep(xb))
}
