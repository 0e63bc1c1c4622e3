use crate::services::patterns::ClassifiedBar;
use crate::services::signal::{aggregate, levels, Signal, TimeframeSet};
use crate::value_objects::bar::round2;
use crate::value_objects::order::{CloseOrder, OpenOrder};
use crate::value_objects::pattern::SecondaryTags;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Last UTC hour (inclusive) in which a new order may be opened.
    pub cutoff_hour_utc: u32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            cutoff_hour_utc: 20,
        }
    }
}

impl LifecyclePolicy {
    pub fn allows_new_orders(&self, hour_utc: u32) -> bool {
        hour_utc <= self.cutoff_hour_utc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleOutcome {
    Opened { order: OpenOrder },
    Refreshed { order: OpenOrder },
    Closed { order: OpenOrder, close: CloseOrder },
    Unchanged { order: OpenOrder },
    NoSignal,
    OutsideTradingWindow,
    InsufficientData { order: Option<OpenOrder> },
    /// An order for this symbol was already closed on the latest 5m bar (or a
    /// later one); reopening on the same data would duplicate the mutation.
    AlreadyClosed { closed_at: i64 },
}

impl LifecycleOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleOutcome::Opened { .. } => "opened",
            LifecycleOutcome::Refreshed { .. } => "refreshed",
            LifecycleOutcome::Closed { .. } => "closed",
            LifecycleOutcome::Unchanged { .. } => "unchanged",
            LifecycleOutcome::NoSignal => "no_signal",
            LifecycleOutcome::OutsideTradingWindow => "outside_trading_window",
            LifecycleOutcome::InsufficientData { .. } => "insufficient_data",
            LifecycleOutcome::AlreadyClosed { .. } => "already_closed",
        }
    }
}

/// State machine `NoOrder -> Open -> Closed` for one symbol. It holds no order
/// state itself: the caller passes the order rehydrated from storage and
/// persists whatever comes back.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderLifecycleManager {
    policy: LifecyclePolicy,
}

impl OrderLifecycleManager {
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self { policy }
    }

    /// `last_closed_at` is the newest close timestamp stored for the symbol; it
    /// only matters when no order is open.
    pub fn evaluate(
        &self,
        current: Option<OpenOrder>,
        last_closed_at: Option<i64>,
        frames: &TimeframeSet<'_>,
        now_hour_utc: u32,
    ) -> LifecycleOutcome {
        match current {
            None => self.try_open(last_closed_at, frames, now_hour_utc),
            Some(order) => self.track(order, frames),
        }
    }

    fn try_open(
        &self,
        last_closed_at: Option<i64>,
        frames: &TimeframeSet<'_>,
        now_hour_utc: u32,
    ) -> LifecycleOutcome {
        if !self.policy.allows_new_orders(now_hour_utc) {
            return LifecycleOutcome::OutsideTradingWindow;
        }
        if !frames.has_history() {
            return LifecycleOutcome::InsufficientData { order: None };
        }
        if let (Some(closed_at), Some(last_5m)) = (last_closed_at, frames.m5.latest()) {
            if closed_at >= last_5m.bar.unixtime {
                return LifecycleOutcome::AlreadyClosed { closed_at };
            }
        }
        match aggregate(frames) {
            Some(signal) => LifecycleOutcome::Opened {
                order: open_from_signal(signal),
            },
            None => LifecycleOutcome::NoSignal,
        }
    }

    fn track(&self, order: OpenOrder, frames: &TimeframeSet<'_>) -> LifecycleOutcome {
        let (Some(last_5m), Some(last_15m)) = (frames.m5.latest(), frames.m15.latest()) else {
            return LifecycleOutcome::InsufficientData { order: Some(order) };
        };
        if last_5m.bar.unixtime < order.last_updated_at {
            return LifecycleOutcome::Unchanged { order };
        }

        let momentum = last_5m.tags.momentum;
        if momentum.opposes(order.direction) {
            let close = close_from_bar(&order, last_5m);
            return LifecycleOutcome::Closed { order, close };
        }

        let refreshed = refresh(&order, last_5m, last_15m);
        if refreshed == order {
            LifecycleOutcome::Unchanged { order }
        } else {
            LifecycleOutcome::Refreshed { order: refreshed }
        }
    }
}

pub fn open_from_signal(signal: Signal) -> OpenOrder {
    OpenOrder {
        symbol: signal.symbol,
        direction: signal.direction,
        entry_price: signal.entry_price,
        stop_loss: signal.stop_loss,
        profit_target: signal.profit_target,
        created_at: signal.unixtime,
        last_updated_at: signal.unixtime,
        hour: signal.hour,
        minute: signal.minute,
        secondary_tags: signal.secondary_tags,
    }
}

fn refresh(order: &OpenOrder, last_5m: &ClassifiedBar, last_15m: &ClassifiedBar) -> OpenOrder {
    let mut next = order.clone();
    next.last_updated_at = last_5m.bar.unixtime;
    next.hour = last_5m.bar.hour;
    next.minute = last_5m.bar.minute;
    next.secondary_tags = SecondaryTags::from(&last_5m.tags);
    if let Some((stop_loss, profit_target)) = levels(order.direction, &last_15m.bar) {
        next.stop_loss = stop_loss;
        next.profit_target = profit_target;
    }
    next
}

fn close_from_bar(order: &OpenOrder, last_5m: &ClassifiedBar) -> CloseOrder {
    CloseOrder {
        symbol: order.symbol.clone(),
        direction_at_close: last_5m.tags.momentum,
        exit_price: round2(last_5m.bar.open),
        stop_loss: 0.0,
        profit_target: 0.0,
        unixtime: last_5m.bar.unixtime,
        hour: last_5m.bar.hour,
        minute: last_5m.bar.minute,
    }
}

#[cfg(test)]
mod tests {
    use super::{LifecycleOutcome, LifecyclePolicy, OrderLifecycleManager};
    use crate::services::indicators::IndicatorRow;
    use crate::services::patterns::{ClassifiedBar, ClassifiedSeries};
    use crate::services::signal::TimeframeSet;
    use crate::value_objects::bar::Bar;
    use crate::value_objects::direction::Direction;
    use crate::value_objects::interval::Interval;
    use crate::value_objects::order::OpenOrder;
    use crate::value_objects::pattern::{EngulfingTag, FvgTag, PatternTag, SecondaryTags};

    fn classified(interval: Interval, ts: i64, momentum: Direction) -> ClassifiedBar {
        ClassifiedBar {
            bar: Bar {
                symbol: "SPY".to_string(),
                interval,
                unixtime: ts,
                month: 12,
                day: 17,
                hour: 15,
                minute: ((ts / 60) % 60) as u32,
                open: 672.5,
                high: 673.0,
                low: 671.2,
                close: 672.0,
            },
            indicators: IndicatorRow {
                ema_short: 672.46,
                ..IndicatorRow::default()
            },
            tags: PatternTag {
                momentum,
                ..PatternTag::default()
            },
        }
    }

    fn series(interval: Interval, last_ts: i64, momenta: &[Direction]) -> ClassifiedSeries {
        let step = interval.step_seconds();
        let n = momenta.len() as i64;
        ClassifiedSeries {
            symbol: "SPY".to_string(),
            interval,
            bars: momenta
                .iter()
                .enumerate()
                .map(|(i, m)| classified(interval, last_ts - (n - 1 - i as i64) * step, *m))
                .collect(),
        }
    }

    fn three(direction: Direction) -> [Direction; 3] {
        [Direction::Neutral, Direction::Neutral, direction]
    }

    fn open_order(direction: Direction, created_at: i64) -> OpenOrder {
        OpenOrder {
            symbol: "SPY".to_string(),
            direction,
            entry_price: 672.6,
            stop_loss: 671.0,
            profit_target: 673.5,
            created_at,
            last_updated_at: created_at,
            hour: 15,
            minute: 30,
            secondary_tags: SecondaryTags::default(),
        }
    }

    #[test]
    fn opens_on_confirmed_signal() {
        let m5 = series(Interval::FiveMinutes, 6_000, &three(Direction::Bearish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bearish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let manager = OrderLifecycleManager::default();
        match manager.evaluate(None, None, &frames, 15) {
            LifecycleOutcome::Opened { order } => {
                assert_eq!(order.direction, Direction::Bearish);
                assert_eq!(order.stop_loss, 673.0);
                assert_eq!(order.profit_target, 671.2);
                assert_eq!(order.entry_price, 672.46);
                assert_eq!(order.created_at, 6_000);
                assert!(order.is_fresh());
            }
            other => panic!("expected opened, got {other:?}"),
        }
    }

    #[test]
    fn disagreement_produces_no_signal() {
        let m5 = series(Interval::FiveMinutes, 6_000, &three(Direction::Bullish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bearish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bearish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        assert_eq!(
            OrderLifecycleManager::default().evaluate(None, None, &frames, 15),
            LifecycleOutcome::NoSignal
        );
    }

    #[test]
    fn cutoff_blocks_new_orders_only() {
        let m5 = series(Interval::FiveMinutes, 6_000, &three(Direction::Bullish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bullish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let manager = OrderLifecycleManager::new(LifecyclePolicy {
            cutoff_hour_utc: 20,
        });
        assert_eq!(
            manager.evaluate(None, None, &frames, 21),
            LifecycleOutcome::OutsideTradingWindow
        );
        let order = open_order(Direction::Bullish, 5_700);
        let tracked = manager.evaluate(Some(order), None, &frames, 21);
        assert_eq!(tracked.kind(), "refreshed");
    }

    #[test]
    fn short_history_blocks_opening() {
        let m5 = series(Interval::FiveMinutes, 6_000, &[Direction::Neutral, Direction::Bullish]);
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bullish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        assert_eq!(
            OrderLifecycleManager::default().evaluate(None, None, &frames, 15),
            LifecycleOutcome::InsufficientData { order: None }
        );
    }

    #[test]
    fn neutral_momentum_refreshes_levels_and_tags() {
        let mut m5 = series(Interval::FiveMinutes, 6_300, &three(Direction::Neutral));
        if let Some(last) = m5.bars.last_mut() {
            last.tags.engulfing = EngulfingTag::BearishEngulf;
            last.tags.fvg = FvgTag::BullishFvg;
        }
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Neutral));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Neutral));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let order = open_order(Direction::Bullish, 6_000);
        match OrderLifecycleManager::default().evaluate(Some(order.clone()), None, &frames, 15) {
            LifecycleOutcome::Refreshed { order: next } => {
                assert_eq!(next.created_at, order.created_at);
                assert_eq!(next.entry_price, order.entry_price);
                assert_eq!(next.last_updated_at, 6_300);
                assert_eq!(next.stop_loss, 671.2);
                assert_eq!(next.profit_target, 672.0);
                assert_eq!(next.secondary_tags.engulfing, EngulfingTag::BearishEngulf);
                assert_eq!(next.secondary_tags.fvg, FvgTag::BullishFvg);
                assert!(!next.is_fresh());
            }
            other => panic!("expected refreshed, got {other:?}"),
        }
    }

    #[test]
    fn opposite_momentum_closes_at_open_price() {
        let m5 = series(Interval::FiveMinutes, 6_600, &three(Direction::Bearish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bullish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let order = open_order(Direction::Bullish, 6_000);
        match OrderLifecycleManager::default().evaluate(Some(order.clone()), None, &frames, 15) {
            LifecycleOutcome::Closed {
                order: closed,
                close,
            } => {
                assert_eq!(closed, order);
                assert_eq!(close.direction_at_close, Direction::Bearish);
                assert_eq!(close.exit_price, 672.5);
                assert_eq!(close.unixtime, 6_600);
                assert_eq!(close.stop_loss, 0.0);
                assert_eq!(close.profit_target, 0.0);
            }
            other => panic!("expected closed, got {other:?}"),
        }
    }

    #[test]
    fn same_bar_twice_is_unchanged() {
        let m5 = series(Interval::FiveMinutes, 6_000, &three(Direction::Bullish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bullish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let manager = OrderLifecycleManager::default();
        let LifecycleOutcome::Opened { order } = manager.evaluate(None, None, &frames, 15) else {
            panic!("expected opened");
        };
        let again = manager.evaluate(Some(order.clone()), None, &frames, 15);
        assert_eq!(again, LifecycleOutcome::Unchanged { order });
    }

    #[test]
    fn stale_bars_never_rewind_an_order() {
        let m5 = series(Interval::FiveMinutes, 5_700, &three(Direction::Bearish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bearish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bearish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let order = open_order(Direction::Bullish, 6_000);
        assert_eq!(
            OrderLifecycleManager::default().evaluate(Some(order.clone()), None, &frames, 15),
            LifecycleOutcome::Unchanged { order }
        );
    }

    #[test]
    fn close_on_the_latest_bar_blocks_a_reopen() {
        let m5 = series(Interval::FiveMinutes, 6_000, &three(Direction::Bullish));
        let m15 = series(Interval::FifteenMinutes, 5_400, &three(Direction::Bullish));
        let m30 = series(Interval::ThirtyMinutes, 5_400, &three(Direction::Bullish));
        let frames = TimeframeSet {
            m5: &m5,
            m15: &m15,
            m30: &m30,
        };
        let manager = OrderLifecycleManager::default();
        assert_eq!(
            manager.evaluate(None, Some(6_000), &frames, 15),
            LifecycleOutcome::AlreadyClosed { closed_at: 6_000 }
        );
        assert_eq!(manager.evaluate(None, Some(5_700), &frames, 15).kind(), "opened");
    }
}
