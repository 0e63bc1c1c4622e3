use crate::value_objects::bar::Bar;
use crate::value_objects::interval::Interval;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarQuery {
    pub symbol: String,
    pub interval: Interval,
}

impl BarQuery {
    pub fn new(symbol: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval,
        }
    }
}

/// Source of closed bars, oldest first, already bucketed to `query.interval`.
pub trait MarketDataFeed {
    fn get_bars(&self, query: &BarQuery) -> Result<Vec<Bar>, String>;
}
