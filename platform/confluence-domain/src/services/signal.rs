use crate::services::patterns::{ClassifiedBar, ClassifiedSeries};
use crate::value_objects::bar::{round2, Bar};
use crate::value_objects::direction::Direction;
use crate::value_objects::pattern::SecondaryTags;
use serde::Serialize;

/// Momentum needs two bars of histogram history behind the latest bar.
pub const MIN_BARS_FOR_SIGNAL: usize = 3;

/// The three intraday series a symbol is evaluated on.
#[derive(Debug, Clone, Copy)]
pub struct TimeframeSet<'a> {
    pub m5: &'a ClassifiedSeries,
    pub m15: &'a ClassifiedSeries,
    pub m30: &'a ClassifiedSeries,
}

impl TimeframeSet<'_> {
    pub fn has_history(&self) -> bool {
        [self.m5, self.m15, self.m30]
            .iter()
            .all(|series| series.len() >= MIN_BARS_FOR_SIGNAL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub profit_target: f64,
    pub unixtime: i64,
    pub hour: u32,
    pub minute: u32,
    pub secondary_tags: SecondaryTags,
}

/// The 5m candidate survives when it agrees with at least one of 15m / 30m.
pub fn confirm_direction(m5: Direction, m15: Direction, m30: Direction) -> Direction {
    if m5 != m15 && m5 != m30 {
        return Direction::Neutral;
    }
    m5
}

/// Stop-loss and profit target for `direction`, taken from the 15m bar.
pub fn levels(direction: Direction, m15: &Bar) -> Option<(f64, f64)> {
    match direction {
        Direction::Bullish => Some((round2(m15.low), round2(m15.close))),
        Direction::Bearish => Some((round2(m15.high), round2(m15.low))),
        Direction::Neutral => None,
    }
}

pub fn aggregate(frames: &TimeframeSet<'_>) -> Option<Signal> {
    if !frames.has_history() {
        return None;
    }
    let last_5m: &ClassifiedBar = frames.m5.latest()?;
    let last_15m: &ClassifiedBar = frames.m15.latest()?;

    let direction = confirm_direction(
        last_5m.tags.momentum,
        last_15m.tags.momentum,
        frames.m30.latest_momentum(),
    );
    let (stop_loss, profit_target) = levels(direction, &last_15m.bar)?;

    Some(Signal {
        symbol: last_5m.bar.symbol.clone(),
        direction,
        entry_price: round2(last_5m.indicators.ema_short),
        stop_loss,
        profit_target,
        unixtime: last_5m.bar.unixtime,
        hour: last_5m.bar.hour,
        minute: last_5m.bar.minute,
        secondary_tags: SecondaryTags::from(&last_5m.tags),
    })
}
