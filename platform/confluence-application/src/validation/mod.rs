use crate::config::Config;
use confluence_domain::repositories::market_data::{BarQuery, MarketDataFeed};
use confluence_domain::services::series::series_quality;
use confluence_domain::value_objects::interval::Interval;
use std::time::Instant;
use tracing::info_span;

/// Pulls every interval for every configured symbol and reports series
/// quality. With `strict`, any unusable series fails the whole check.
pub fn probe_feed(
    config: &Config,
    feed: &dyn MarketDataFeed,
    strict: bool,
) -> Result<serde_json::Value, String> {
    let _span = info_span!("app.validate", strict = strict, symbols = config.run.symbols.len())
        .entered();

    let mut entries = Vec::new();
    let mut failures = 0usize;
    for symbol in &config.run.symbols {
        for interval in Interval::ALL {
            let started = Instant::now();
            let entry = match feed.get_bars(&BarQuery::new(symbol, interval)) {
                Ok(bars) => {
                    let report = series_quality(&bars, interval);
                    if !report.is_usable() {
                        failures += 1;
                    }
                    serde_json::json!({
                        "symbol": symbol,
                        "interval": interval.label(),
                        "usable": report.is_usable(),
                        "bars": report.bars,
                        "duplicates": report.duplicates,
                        "out_of_order": report.out_of_order,
                        "non_finite": report.non_finite,
                        "gaps": report.gaps,
                        "max_gap_seconds": report.max_gap_seconds,
                        "first_timestamp": report.first_timestamp,
                        "last_timestamp": report.last_timestamp,
                    })
                }
                Err(err) => {
                    failures += 1;
                    serde_json::json!({
                        "symbol": symbol,
                        "interval": interval.label(),
                        "usable": false,
                        "error": err,
                    })
                }
            };
            metrics::histogram!("confluence.validate.get_bars_ms", "interval" => interval.label())
                .record(started.elapsed().as_millis() as f64);
            entries.push(entry);
        }
    }
    metrics::gauge!("confluence.validate.unusable_series").set(failures as f64);

    if strict && failures > 0 {
        return Err(format!(
            "strict validation failed: {failures} unusable series"
        ));
    }
    Ok(serde_json::json!({
        "series": entries,
        "unusable": failures,
    }))
}
