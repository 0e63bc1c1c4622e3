use confluence_domain::repositories::market_data::{BarQuery, MarketDataFeed};
use confluence_domain::repositories::orders::{AlertRecord, OrderStore};
use confluence_domain::services::series::{resample_bars, series_quality};
use confluence_domain::value_objects::bar::offset_from_minutes;
use confluence_domain::value_objects::interval::Interval;
use confluence_infrastructure::market_data::csv_files::CsvBarFeed;
use confluence_infrastructure::market_data::yahoo::SESSION_ORIGIN_SECONDS;
use confluence_infrastructure::persistence::memory::InMemoryOrderStore;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

// 2025-12-17 13:00:00 UTC
const AFTERNOON: i64 = 1_765_976_400;

fn fixture_dir() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!(
        "confluence_pipeline_{}_{}",
        std::process::id(),
        now
    ));
    fs::create_dir_all(&dir).expect("create fixture dir");

    let mut csv = String::from("timestamp_utc,open,high,low,close\n");
    for i in 0..16i64 {
        let base = 100.0 + i as f64;
        writeln!(
            csv,
            "{},{},{},{},{}",
            AFTERNOON + i * 1_800,
            base,
            base + 1.0,
            base - 1.0,
            base + 0.5
        )
        .expect("format row");
    }
    fs::write(dir.join("SPY_30m.csv"), csv).expect("write fixture");
    dir
}

#[test]
fn thirty_minute_fixture_resamples_into_session_aligned_four_hour_bars() {
    let offset = offset_from_minutes(-300);
    let feed = CsvBarFeed::new(fixture_dir(), offset);
    let bars = feed
        .get_bars(&BarQuery::new("SPY", Interval::ThirtyMinutes))
        .expect("load fixture");

    let quality = series_quality(&bars, Interval::ThirtyMinutes);
    assert!(quality.is_usable(), "{}", quality.describe());
    assert_eq!(quality.bars, 16);

    let four_hour = resample_bars(&bars, Interval::FourHours, SESSION_ORIGIN_SECONDS, offset)
        .expect("resample");
    assert_eq!(four_hour.len(), 2);

    let first = &four_hour[0];
    assert_eq!(first.unixtime, AFTERNOON);
    assert_eq!((first.hour, first.minute), (8, 0));
    assert_eq!(first.open, 100.0);
    assert_eq!(first.high, 108.0);
    assert_eq!(first.low, 99.0);
    assert_eq!(first.close, 107.5);

    let second = &four_hour[1];
    assert_eq!(second.unixtime, AFTERNOON + 4 * 3_600);
    assert_eq!(second.open, 108.0);
    assert_eq!(second.high, 116.0);
    assert_eq!(second.low, 107.0);
    assert_eq!(second.close, 115.5);
}

#[test]
fn alert_ledger_gates_repeats_until_purged() {
    let store = InMemoryOrderStore::new();
    let record = AlertRecord {
        symbol: "SPY".to_string(),
        interval: "5m:open".to_string(),
        bar_timestamp: AFTERNOON,
        message: "Symbol: SPY".to_string(),
        sent_at: AFTERNOON + 60,
    };
    store.record_alert(&record).unwrap();
    store.record_alert(&record).unwrap();

    assert!(store.exists_alerted("SPY", "5m:open", AFTERNOON).unwrap());
    assert!(!store.exists_alerted("SPY", "5m:close", AFTERNOON).unwrap());
    assert_eq!(store.alerts().len(), 1);

    assert_eq!(store.purge_older_than(AFTERNOON + 86_400).unwrap(), 1);
    assert!(!store.exists_alerted("SPY", "5m:open", AFTERNOON).unwrap());
}
