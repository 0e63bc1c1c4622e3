use crate::config::Config;
use confluence_domain::repositories::alerts::AlertSink;
use confluence_domain::repositories::market_data::{BarQuery, MarketDataFeed};
use confluence_domain::repositories::orders::{AlertRecord, OrderStore};
use confluence_domain::services::alerts::Alert;
use confluence_domain::services::indicators::IndicatorSettings;
use confluence_domain::services::patterns::ClassifiedSeries;
use confluence_domain::services::series::series_quality;
use confluence_domain::value_objects::interval::Interval;
use serde::Serialize;
use std::time::Instant;

/// Fetches, checks, classifies and trims one series. Indicators see the full
/// fetched history; trimming happens afterwards.
pub(crate) fn load_series(
    config: &Config,
    feed: &dyn MarketDataFeed,
    symbol: &str,
    interval: Interval,
) -> Result<ClassifiedSeries, String> {
    let started = Instant::now();
    let bars = feed
        .get_bars(&BarQuery::new(symbol, interval))
        .map_err(|err| format!("failed to load {interval} bars for {symbol}: {err}"))?;
    metrics::histogram!("confluence.feed.get_bars_ms", "interval" => interval.label())
        .record(started.elapsed().as_millis() as f64);

    if bars.is_empty() {
        return Err(format!("no {interval} bars for {symbol}"));
    }
    let report = series_quality(&bars, interval);
    if !report.is_usable() {
        metrics::counter!("confluence.feed.unusable_series_total", "interval" => interval.label())
            .increment(1);
        return Err(format!(
            "unusable {interval} series for {symbol}: {}",
            report.describe()
        ));
    }

    let mut series =
        ClassifiedSeries::build(symbol, interval, bars, &IndicatorSettings::default());
    series.trim_to_last(config.trading.keep_bars(interval));
    Ok(series)
}

/// What happened to one alert on its way to the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertDelivery {
    pub sent: bool,
    pub deduped: bool,
    pub error: Option<String>,
    pub ledger_errors: Vec<String>,
}

/// Dedup gate, then notify, then ledger. A ledger outage degrades to
/// "not yet alerted" so the alert still goes out.
pub(crate) fn deliver_alert(
    store: &dyn OrderStore,
    sink: &dyn AlertSink,
    alert: &Alert,
    now_unixtime: i64,
) -> AlertDelivery {
    let mut delivery = AlertDelivery::default();
    let key = alert.kind.ledger_key();

    match store.exists_alerted(&alert.symbol, key, alert.bar_timestamp) {
        Ok(true) => {
            metrics::counter!("confluence.alerts.deduped_total", "kind" => key).increment(1);
            delivery.deduped = true;
            return delivery;
        }
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(symbol = %alert.symbol, kind = key, error = %err, "alert dedup check failed");
            delivery.ledger_errors.push(err);
        }
    }

    if let Err(err) = sink.notify(&alert.message) {
        metrics::counter!("confluence.alerts.failed_total", "kind" => key).increment(1);
        tracing::error!(symbol = %alert.symbol, kind = key, error = %err, "alert delivery failed");
        delivery.error = Some(err);
        return delivery;
    }
    metrics::counter!("confluence.alerts.sent_total", "kind" => key).increment(1);
    delivery.sent = true;

    let record = AlertRecord {
        symbol: alert.symbol.clone(),
        interval: key.to_string(),
        bar_timestamp: alert.bar_timestamp,
        message: alert.message.clone(),
        sent_at: now_unixtime,
    };
    if let Err(err) = store.record_alert(&record) {
        tracing::warn!(symbol = %alert.symbol, kind = key, error = %err, "failed to record alert");
        delivery.ledger_errors.push(err);
    }
    delivery
}
