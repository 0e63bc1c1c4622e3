use chrono::{FixedOffset, Utc};
use confluence_domain::repositories::market_data::{BarQuery, MarketDataFeed};
use confluence_domain::services::series::{drop_incomplete, resample_bars};
use confluence_domain::value_objects::bar::Bar;
use confluence_domain::value_objects::interval::Interval;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::Url;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
/// 1h and 4h buckets start at 09:00 UTC (05:00 New York daylight time).
pub const SESSION_ORIGIN_SECONDS: i64 = 9 * 3_600;

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parses a chart API body into bars. Rows with any missing price are dropped,
/// never filled.
pub fn parse_chart_response(
    body: &str,
    symbol: &str,
    interval: Interval,
    offset: FixedOffset,
) -> Result<Vec<Bar>, String> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|err| format!("failed to parse chart response: {err}"))?;
    if let Some(error) = envelope.chart.error {
        return Err(format!(
            "chart API error {}: {}",
            error.code.unwrap_or_default(),
            error.description.unwrap_or_default()
        ));
    }
    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(format!("chart response for {symbol} has no result"));
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (idx, ts) in result.timestamp.iter().enumerate() {
        let field = |values: &[Option<f64>]| values.get(idx).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        bars.push(Bar::from_ohlc(symbol, interval, *ts, offset, open, high, low, close));
    }
    Ok(bars)
}

/// Keeps bars that start on an interval boundary. The API appends a live bar
/// stamped with the current time, which would otherwise look like a real bar.
pub fn keep_aligned(bars: Vec<Bar>) -> Vec<Bar> {
    bars.into_iter()
        .filter(|bar| bar.unixtime.rem_euclid(bar.interval.step_seconds()) == 0)
        .collect()
}

/// Yahoo chart API feed. 5m/15m/30m are fetched directly; 1h and 4h are
/// rebuilt from 30m bars anchored at [`SESSION_ORIGIN_SECONDS`].
pub struct YahooChartFeed {
    base_url: String,
    lookback_days: u32,
    offset: FixedOffset,
    drop_incomplete: bool,
    client: Client,
}

impl YahooChartFeed {
    pub fn new(
        base_url: Option<String>,
        lookback_days: u32,
        timeout_ms: u64,
        offset: FixedOffset,
        drop_incomplete: bool,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            lookback_days: lookback_days.max(1),
            offset,
            drop_incomplete,
            client,
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| format!("invalid feed base_url '{}': {err}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| format!("invalid feed base_url '{}'", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    fn fetch(&self, symbol: &str, interval: Interval, now: i64) -> Result<Vec<Bar>, String> {
        let start = now - i64::from(self.lookback_days) * 86_400;
        let url = self.chart_url(symbol)?;
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .query(&[
                ("period1", start.to_string()),
                ("period2", now.to_string()),
                ("interval", interval.label().to_string()),
                ("includePrePost", "true".to_string()),
            ])
            .send()
            .map_err(|err| format!("chart request failed: {err}"))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| format!("failed to read chart response: {err}"))?;
        if !status.is_success() {
            return Err(format!("chart request returned {status}"));
        }
        parse_chart_response(&body, symbol, interval, self.offset)
    }
}

impl MarketDataFeed for YahooChartFeed {
    fn get_bars(&self, query: &BarQuery) -> Result<Vec<Bar>, String> {
        let span = tracing::info_span!(
            "infra.yahoo.get_bars",
            symbol = %query.symbol,
            interval = %query.interval
        );
        let _enter = span.enter();
        let started = Instant::now();
        let now = Utc::now().timestamp();

        let source = if query.interval.is_native() {
            query.interval
        } else {
            Interval::ThirtyMinutes
        };
        let fetched = match self.fetch(&query.symbol, source, now) {
            Ok(bars) => bars,
            Err(err) => {
                metrics::counter!("confluence.infra.yahoo.calls_total", "result" => "err")
                    .increment(1);
                tracing::warn!(error = %err, "chart fetch failed");
                return Err(err);
            }
        };
        let raw = fetched.len();

        let mut bars = keep_aligned(fetched);
        if source != query.interval {
            bars = resample_bars(&bars, query.interval, SESSION_ORIGIN_SECONDS, self.offset)?;
        }
        if self.drop_incomplete {
            bars = drop_incomplete(bars, now);
        }

        metrics::counter!("confluence.infra.yahoo.calls_total", "result" => "ok").increment(1);
        metrics::histogram!("confluence.infra.yahoo.get_bars_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(raw, bars = bars.len(), "loaded chart bars");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::{keep_aligned, parse_chart_response, YahooChartFeed};
    use confluence_domain::value_objects::bar::offset_from_minutes;
    use confluence_domain::value_objects::interval::Interval;

    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "SPY"},
                "timestamp": [1766004600, 1766004900, 1766005012],
                "indicators": {"quote": [{
                    "open":  [672.79, 672.41, null],
                    "high":  [672.90, 672.50, 671.40],
                    "low":   [672.24, 671.10, 671.20],
                    "close": [672.41, 671.30, 671.35],
                    "volume": [1200, 1500, 40]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parse_drops_rows_with_missing_prices() {
        let bars =
            parse_chart_response(BODY, "SPY", Interval::FiveMinutes, offset_from_minutes(-300))
                .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 671.30);
        assert_eq!(bars[1].hour, 15);
        assert_eq!(bars[1].minute, 55);
    }

    #[test]
    fn parse_surfaces_api_errors() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_response(body, "XXX", Interval::FiveMinutes, offset_from_minutes(0))
            .unwrap_err();
        assert!(err.contains("Not Found"));
        assert!(parse_chart_response("<html>", "SPY", Interval::FiveMinutes, offset_from_minutes(0)).is_err());
    }

    #[test]
    fn live_bar_off_the_grid_is_discarded() {
        let body = BODY.replace("672.41, null]", "672.41, 671.30]");
        let bars =
            parse_chart_response(&body, "SPY", Interval::FiveMinutes, offset_from_minutes(0))
                .unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(keep_aligned(bars).len(), 2);
    }

    #[test]
    fn chart_url_appends_symbol_segment() {
        let feed = YahooChartFeed::new(
            Some("https://example.test/".to_string()),
            4,
            1_000,
            offset_from_minutes(0),
            true,
        )
        .unwrap();
        let url = feed.chart_url("ES=F").unwrap();
        assert_eq!(url.as_str(), "https://example.test/v8/finance/chart/ES=F");
    }
}
