use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar interval of one series. Labels follow the feed's notation (`5m`, `1h`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::FourHours,
    ];

    pub fn parse(value: &str) -> Result<Self, String> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "5m" | "5min" => Ok(Interval::FiveMinutes),
            "15m" | "15min" => Ok(Interval::FifteenMinutes),
            "30m" | "30min" => Ok(Interval::ThirtyMinutes),
            "1h" | "60m" | "1hour" => Ok(Interval::OneHour),
            "4h" | "240m" | "4hour" => Ok(Interval::FourHours),
            _ => Err(format!("unsupported interval: {value}")),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
        }
    }

    pub fn step_seconds(&self) -> i64 {
        match self {
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::ThirtyMinutes => 1_800,
            Interval::OneHour => 3_600,
            Interval::FourHours => 14_400,
        }
    }

    /// Whether the exchange feed serves this interval directly or it has to be
    /// rebuilt from a finer series.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Interval::FiveMinutes | Interval::FifteenMinutes | Interval::ThirtyMinutes
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
