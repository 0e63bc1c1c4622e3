use crate::value_objects::bar::{round2, Bar};
use crate::value_objects::direction::Direction;
use serde::{Deserialize, Serialize};

mod smoothing;

pub use smoothing::{rsi_from_averages, Ema, WilderRsi};

/// Indicator values attached to one bar. Every field is rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub macd: f64,
    pub macd_signal: f64,
    pub histogram: f64,
    pub rsi: f64,
    pub rsi_signal: f64,
    pub ema_short: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_signal: usize,
    pub ema_short: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_signal: 14,
            ema_short: 5,
        }
    }
}

/// Computes one [`IndicatorRow`] per bar. Pure: every value depends only on the
/// bars up to and including its own index.
pub fn compute_indicators(bars: &[Bar], settings: &IndicatorSettings) -> Vec<IndicatorRow> {
    let mut fast = Ema::with_span(settings.macd_fast);
    let mut slow = Ema::with_span(settings.macd_slow);
    let mut signal = Ema::with_span(settings.macd_signal);
    let mut rsi = WilderRsi::new(settings.rsi_period);
    let mut rsi_signal = Ema::with_span(settings.rsi_signal);
    let mut ema_short = Ema::with_span(settings.ema_short);

    bars.iter()
        .map(|bar| {
            let close = bar.close;
            let macd_line = fast.update(close) - slow.update(close);
            let signal_line = signal.update(macd_line);
            let rsi_value = round2(rsi.update(close));
            let rsi_signal_value = rsi_signal.update(rsi_value);

            IndicatorRow {
                macd: round2(macd_line),
                macd_signal: round2(signal_line),
                histogram: round2(macd_line - signal_line),
                rsi: rsi_value,
                rsi_signal: round2(rsi_signal_value),
                ema_short: round2(ema_short.update(close)),
            }
        })
        .collect()
}

/// RSI crossing its signal line between two consecutive rows.
pub fn rsi_crossover(prev: &IndicatorRow, current: &IndicatorRow) -> Direction {
    if current.rsi > current.rsi_signal && prev.rsi < prev.rsi_signal {
        Direction::Bullish
    } else if current.rsi < current.rsi_signal && prev.rsi > prev.rsi_signal {
        Direction::Bearish
    } else {
        Direction::Neutral
    }
}
