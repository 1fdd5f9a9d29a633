use crate::series::Bar;
use std::collections::HashMap;

/// One tick of the bar clock: the bars that closed at `timestamp` (ms).
#[derive(Debug, Clone, PartialEq)]
pub struct MarketUpdate {
    pub timestamp: i64,
    pub bars: HashMap<String, Bar>,
}

pub trait MarketFeed {
    /// Next update in time order, `None` once the feed is exhausted.
    fn next_update(&mut self) -> Option<MarketUpdate>;
}
