use crate::services::indicators::rsi_crossover;
use crate::services::patterns::ClassifiedSeries;
use crate::value_objects::direction::Direction;
use crate::value_objects::pattern::{EngulfingTag, FvgTag};
use serde::Serialize;

/// Dedup key under which structure alerts are recorded.
pub const STRUCTURE_ALERT_KEY: &str = "4h-1h";

/// A fresh 1h breakout that the 4h breakout already agrees with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureShift {
    pub symbol: String,
    pub direction: Direction,
    pub unixtime: i64,
    pub hour: u32,
    pub minute: u32,
    pub engulfing: EngulfingTag,
    pub fvg: FvgTag,
    pub rsi_crossover: Direction,
}

pub fn detect_structure_shift(h1: &ClassifiedSeries, h4: &ClassifiedSeries) -> Option<StructureShift> {
    if h1.len() < 2 || h4.len() < 2 {
        return None;
    }
    let last_4h = h4.latest()?;
    let last_1h = h1.latest()?;
    let prev_1h = h1.previous()?;

    let direction = last_1h.tags.breakout;
    if !direction.is_directional()
        || last_4h.tags.breakout != direction
        || prev_1h.tags.breakout == direction
    {
        return None;
    }

    Some(StructureShift {
        symbol: last_1h.bar.symbol.clone(),
        direction,
        unixtime: last_1h.bar.unixtime,
        hour: last_1h.bar.hour,
        minute: last_1h.bar.minute,
        engulfing: last_1h.tags.engulfing,
        fvg: last_1h.tags.fvg,
        rsi_crossover: rsi_crossover(&prev_1h.indicators, &last_1h.indicators),
    })
}
