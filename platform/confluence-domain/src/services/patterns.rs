use crate::services::indicators::{compute_indicators, IndicatorRow, IndicatorSettings};
use crate::value_objects::bar::Bar;
use crate::value_objects::direction::Direction;
use crate::value_objects::interval::Interval;
use crate::value_objects::pattern::{EngulfingTag, FvgTag, PatternTag};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedBar {
    pub bar: Bar,
    pub indicators: IndicatorRow,
    pub tags: PatternTag,
}

/// An ordered, fully classified (symbol, interval) series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSeries {
    pub symbol: String,
    pub interval: Interval,
    pub bars: Vec<ClassifiedBar>,
}

impl ClassifiedSeries {
    /// Runs the indicator engine and the classifier over `bars` in one pass.
    pub fn build(
        symbol: &str,
        interval: Interval,
        bars: Vec<Bar>,
        settings: &IndicatorSettings,
    ) -> Self {
        let rows = compute_indicators(&bars, settings);
        Self {
            symbol: symbol.to_string(),
            interval,
            bars: classify(bars, rows),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&ClassifiedBar> {
        self.bars.last()
    }

    pub fn previous(&self) -> Option<&ClassifiedBar> {
        self.bars.len().checked_sub(2).and_then(|idx| self.bars.get(idx))
    }

    pub fn latest_momentum(&self) -> Direction {
        self.latest()
            .map(|bar| bar.tags.momentum)
            .unwrap_or_default()
    }

    /// Keeps only the most recent `n` bars. Tags are already computed, so
    /// trimming never changes them.
    pub fn trim_to_last(&mut self, n: usize) {
        if self.bars.len() > n {
            let drop = self.bars.len() - n;
            self.bars.drain(..drop);
        }
    }
}

/// Left-to-right scan producing one tag per bar; the breakout tag threads the
/// previous bar's value forward.
pub fn classify(bars: Vec<Bar>, rows: Vec<IndicatorRow>) -> Vec<ClassifiedBar> {
    let mut out: Vec<ClassifiedBar> = Vec::with_capacity(bars.len());

    for (bar, indicators) in bars.into_iter().zip(rows) {
        let i = out.len();
        let mut tags = PatternTag::default();

        if let Some(prev) = out.last() {
            tags.breakout = breakout(&prev.bar, &bar, prev.tags.breakout);
            tags.engulfing = engulfing(&prev.bar, &bar);
        }

        if i >= 2 {
            let before = &out[i - 2];
            let prev = &out[i - 1];
            tags.fvg = fair_value_gap(&before.bar, &bar);
            tags.momentum = momentum(
                &indicators,
                prev.indicators.histogram,
                before.indicators.histogram,
            );
        }

        out.push(ClassifiedBar {
            bar,
            indicators,
            tags,
        });
    }

    out
}

pub fn breakout(prev: &Bar, current: &Bar, carried: Direction) -> Direction {
    if current.close > prev.high {
        Direction::Bullish
    } else if current.close < prev.low {
        Direction::Bearish
    } else {
        carried
    }
}

pub fn engulfing(prev: &Bar, current: &Bar) -> EngulfingTag {
    let (o, c) = (current.open, current.close);
    let (o1, c1) = (prev.open, prev.close);

    if c > o && c1 < o1 && c > o1 && o < c1 {
        EngulfingTag::BullishEngulf
    } else if c < o && c1 > o1 && c < o1 && o > c1 {
        EngulfingTag::BearishEngulf
    } else {
        EngulfingTag::None
    }
}

pub fn fair_value_gap(first: &Bar, third: &Bar) -> FvgTag {
    if first.low > third.high {
        FvgTag::BullishFvg
    } else if first.high < third.low {
        FvgTag::BearishFvg
    } else {
        FvgTag::None
    }
}

/// MACD momentum ladder over the current row and the two previous histogram
/// values. Rules overlap; the first match wins.
pub fn momentum(current: &IndicatorRow, h1: f64, h2: f64) -> Direction {
    let m = current.macd;
    let s = current.macd_signal;
    let h = current.histogram;

    if ![m, s, h, h1, h2].iter().all(|v| v.is_finite()) {
        return Direction::Neutral;
    }

    // fading while positive
    if h > 0.0 && h < h1 && h1 > h2 {
        return Direction::Bearish;
    }
    // recovering while negative
    if h < 0.0 && h > h1 && h1 < h2 {
        return Direction::Bullish;
    }

    let rising = h > h1 && h1 > h2;
    if (m > s && m > 0.0)
        || (m > s && h > 0.0)
        || (h > 0.0 && rising)
        || (m > 0.0 && s > 0.0 && rising)
    {
        return Direction::Bullish;
    }

    let falling = h < h1 && h1 < h2;
    if (m < s && m < 0.0)
        || (m < s && h < 0.0)
        || (h < 0.0 && falling)
        || (m < 0.0 && s < 0.0 && falling)
        || (m > 0.0 && s > 0.0 && h < h1 && h1 > h2)
    {
        return Direction::Bearish;
    }

    Direction::Neutral
}
