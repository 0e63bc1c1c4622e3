use crate::value_objects::interval::Interval;
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC bar of a (symbol, interval) series. Calendar fields are expressed in
/// the exchange-local clock the feed was configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub interval: Interval,
    pub unixtime: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn from_ohlc(
        symbol: &str,
        interval: Interval,
        unixtime: i64,
        offset: FixedOffset,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        let cal = calendar_fields(unixtime, offset);
        Self {
            symbol: symbol.to_string(),
            interval,
            unixtime,
            month: cal.month,
            day: cal.day,
            hour: cal.hour,
            minute: cal.minute,
            open,
            high,
            low,
            close,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

pub fn calendar_fields(unixtime: i64, offset: FixedOffset) -> CalendarFields {
    let local = DateTime::from_timestamp(unixtime, 0)
        .unwrap_or_default()
        .with_timezone(&offset);
    CalendarFields {
        month: local.month(),
        day: local.day(),
        hour: local.hour(),
        minute: local.minute(),
    }
}

/// Builds a fixed offset from minutes east of UTC, falling back to UTC when out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Prices and indicator outputs are compared at cent precision.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}
