use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::market_feed::{MarketFeed, MarketUpdate};
use crate::series::Bar;

// Data structures that mirror the JSONL bar dump
#[derive(Debug, Clone, Deserialize)]
struct DumpedBar {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DumpedDataEntry {
    timestamp: i64,
    bars: HashMap<String, DumpedBar>,
}

impl DumpedDataEntry {
    fn into_update(self) -> MarketUpdate {
        let timestamp = self.timestamp;
        let bars = self
            .bars
            .into_iter()
            .map(|(symbol, bar)| {
                let bar = Bar {
                    timestamp,
                    open: bar.open.unwrap_or(bar.close),
                    high: bar.high.unwrap_or(bar.close),
                    low: bar.low.unwrap_or(bar.close),
                    close: bar.close,
                };
                (symbol, bar)
            })
            .collect();
        MarketUpdate { timestamp, bars }
    }
}

#[derive(Debug)]
pub struct ReplayFeed {
    data: Vec<MarketUpdate>,
    cursor: usize,
}

impl ReplayFeed {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut data: Vec<MarketUpdate> = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read replay line {}", line_no + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: DumpedDataEntry = serde_json::from_str(&line).with_context(|| {
                format!("failed to parse replay entry at line {}", line_no + 1)
            })?;
            if let Some(last) = data.last() {
                if entry.timestamp <= last.timestamp {
                    log::warn!(
                        "[BACKTEST] skipping out-of-order entry at line {} (ts={} last={})",
                        line_no + 1,
                        entry.timestamp,
                        last.timestamp
                    );
                    continue;
                }
            }
            data.push(entry.into_update());
        }

        if data.is_empty() {
            return Err(anyhow!("Data dump file is empty or invalid: {}", path.display()));
        }
        log::info!(
            "[BACKTEST] loaded {} updates from {}",
            data.len(),
            path.display()
        );

        Ok(Self { data, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn current_timestamp_ms(&self) -> Option<i64> {
        self.data.get(self.cursor).map(|e| e.timestamp)
    }
}

impl MarketFeed for ReplayFeed {
    fn next_update(&mut self) -> Option<MarketUpdate> {
        let update = self.data.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(update)
    }
}
