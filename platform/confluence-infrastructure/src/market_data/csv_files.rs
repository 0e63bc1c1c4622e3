use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use confluence_domain::repositories::market_data::{BarQuery, MarketDataFeed};
use confluence_domain::value_objects::bar::Bar;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp_utc: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    #[allow(dead_code)]
    volume: Option<f64>,
}

/// Reads bars from `{dir}/{SYMBOL}_{interval}.csv`, e.g. `ES_F_5m.csv`.
///
/// Rows are returned in file order. Duplicates and out-of-order rows are left
/// for the series quality check to report.
pub struct CsvBarFeed {
    dir: PathBuf,
    offset: FixedOffset,
}

impl CsvBarFeed {
    pub fn new(dir: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            dir: dir.into(),
            offset,
        }
    }

    pub fn path_for(&self, query: &BarQuery) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.csv",
            file_stem(&query.symbol),
            query.interval.label()
        ))
    }
}

impl MarketDataFeed for CsvBarFeed {
    fn get_bars(&self, query: &BarQuery) -> Result<Vec<Bar>, String> {
        let path = self.path_for(query);
        let bars = load_bars(&path, query, self.offset)?;
        tracing::debug!(
            path = %path.display(),
            bars = bars.len(),
            "loaded csv bars"
        );
        Ok(bars)
    }
}

fn file_stem(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn load_bars(path: &Path, query: &BarQuery, offset: FixedOffset) -> Result<Vec<Bar>, String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open bar CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut bars = Vec::new();
    for (row, result) in reader.deserialize::<BarRecord>().enumerate() {
        let record = result.map_err(|err| {
            format!("failed to parse CSV row {} in {}: {}", row + 1, path.display(), err)
        })?;
        let unixtime = parse_timestamp(&record.timestamp_utc)?;
        bars.push(Bar::from_ohlc(
            &query.symbol,
            query.interval,
            unixtime,
            offset,
            record.open,
            record.high,
            record.low,
            record.close,
        ));
    }
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        let dt: DateTime<Utc> = Utc.from_utc_datetime(&naive);
        return Ok(dt.timestamp());
    }
    if let Ok(epoch) = value.parse::<i64>() {
        return Ok(epoch);
    }

    Err(format!("unsupported timestamp format: {}", value))
}
