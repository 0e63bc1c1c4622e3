use confluence_domain::services::indicators::IndicatorSettings;
use confluence_domain::services::lifecycle::{LifecycleOutcome, OrderLifecycleManager};
use confluence_domain::services::patterns::ClassifiedSeries;
use confluence_domain::services::signal::{aggregate, TimeframeSet};
use confluence_domain::value_objects::bar::{offset_from_minutes, Bar};
use confluence_domain::value_objects::direction::Direction;
use confluence_domain::value_objects::interval::Interval;

// 2025-12-17 14:30 UTC, regular session open.
const SESSION_OPEN: i64 = 1_765_981_800;

fn series(interval: Interval, ohlc: &[(f64, f64, f64, f64)]) -> ClassifiedSeries {
    let step = interval.step_seconds();
    let bars: Vec<Bar> = ohlc
        .iter()
        .enumerate()
        .map(|(idx, (o, h, l, c))| {
            Bar::from_ohlc(
                "SPY",
                interval,
                SESSION_OPEN + idx as i64 * step,
                offset_from_minutes(-300),
                *o,
                *h,
                *l,
                *c,
            )
        })
        .collect();
    ClassifiedSeries::build("SPY", interval, bars, &IndicatorSettings::default())
}

fn five_minute() -> ClassifiedSeries {
    series(
        Interval::FiveMinutes,
        &[
            (672.90, 673.40, 672.70, 673.20),
            (673.20, 673.85, 673.05, 673.70),
            (673.70, 673.95, 673.10, 673.25),
            (673.25, 673.30, 672.60, 672.80),
            (672.80, 672.95, 672.24, 672.41),
            (672.41, 672.50, 671.10, 671.30),
        ],
    )
}

fn fifteen_minute() -> ClassifiedSeries {
    series(
        Interval::FifteenMinutes,
        &[
            (672.60, 673.50, 672.40, 673.20),
            (673.20, 674.10, 673.00, 673.70),
            (673.70, 673.71, 672.53, 672.53),
        ],
    )
}

fn thirty_minute() -> ClassifiedSeries {
    series(
        Interval::ThirtyMinutes,
        &[
            (672.00, 673.40, 671.90, 673.30),
            (673.30, 674.10, 673.10, 673.90),
            (673.90, 673.95, 672.50, 672.60),
        ],
    )
}

#[test]
fn close_below_prior_low_flips_breakout_bearish() {
    let m5 = five_minute();
    let last = m5.latest().unwrap();
    let prev = m5.previous().unwrap();
    assert_eq!(prev.bar.low, 672.24);
    assert_eq!(last.bar.close, 671.30);
    assert_eq!(last.tags.breakout, Direction::Bearish);
    assert_eq!(last.bar.hour, 9);
    assert_eq!(last.bar.minute, 55);
}

#[test]
fn rollover_turns_macd_momentum_bearish_on_every_timeframe() {
    let m5 = five_minute();
    let last = m5.latest().unwrap();
    assert_eq!(last.indicators.macd, -0.2);
    assert_eq!(last.indicators.macd_signal, -0.05);
    assert_eq!(last.indicators.histogram, -0.16);
    let momenta: Vec<Direction> = m5.bars.iter().map(|b| b.tags.momentum).collect();
    assert_eq!(
        momenta,
        vec![
            Direction::Neutral,
            Direction::Neutral,
            Direction::Bearish,
            Direction::Bearish,
            Direction::Bearish,
            Direction::Bearish,
        ]
    );

    let m15 = fifteen_minute();
    let last = m15.latest().unwrap();
    assert_eq!(last.indicators.macd, -0.02);
    assert_eq!(last.indicators.histogram, -0.02);
    assert_eq!(m15.latest_momentum(), Direction::Bearish);
    assert_eq!(thirty_minute().latest_momentum(), Direction::Bearish);
}

#[test]
fn computed_bearish_momentum_emits_bearish_signal_with_15m_levels() {
    let m5 = five_minute();
    let m15 = fifteen_minute();
    let m30 = thirty_minute();

    let frames = TimeframeSet {
        m5: &m5,
        m15: &m15,
        m30: &m30,
    };
    let signal = aggregate(&frames).unwrap();
    assert_eq!(signal.direction, Direction::Bearish);
    assert_eq!(signal.stop_loss, 673.71);
    assert_eq!(signal.profit_target, 672.53);
    assert_eq!(signal.entry_price, m5.latest().unwrap().indicators.ema_short);

    let outcome = OrderLifecycleManager::default().evaluate(None, None, &frames, 14);
    let LifecycleOutcome::Opened { order } = outcome else {
        panic!("expected an opened order, got {outcome:?}");
    };
    assert_eq!(order.direction, Direction::Bearish);
    assert_eq!(order.created_at, SESSION_OPEN + 5 * 300);
}
