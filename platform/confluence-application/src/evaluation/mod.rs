use crate::config::Config;
use crate::shared::{deliver_alert, load_series};
use chrono::{DateTime, Timelike, Utc};
use confluence_domain::repositories::alerts::AlertSink;
use confluence_domain::repositories::market_data::MarketDataFeed;
use confluence_domain::repositories::orders::OrderStore;
use confluence_domain::services::alerts::{alert_for_outcome, Alert};
use confluence_domain::services::lifecycle::{LifecycleOutcome, OrderLifecycleManager};
use confluence_domain::services::patterns::ClassifiedSeries;
use confluence_domain::services::signal::TimeframeSet;
use confluence_domain::value_objects::interval::Interval;
use serde::Serialize;
use std::time::Instant;
use tracing::info_span;

pub use crate::shared::AlertDelivery;

/// The collaborators one evaluation talks to.
#[derive(Clone, Copy)]
pub struct EvaluationDeps<'a> {
    pub feed: &'a dyn MarketDataFeed,
    pub store: &'a dyn OrderStore,
    pub alerts: &'a dyn AlertSink,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub symbol: String,
    pub evaluated_at: i64,
    pub outcome: Option<LifecycleOutcome>,
    /// Why the symbol was skipped this tick (feed failure or unusable series).
    pub skipped: Option<String>,
    pub alert: Option<Alert>,
    pub delivery: Option<AlertDelivery>,
    pub persistence_errors: Vec<String>,
}

impl EvaluationReport {
    fn new(symbol: &str, now: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            evaluated_at: now.timestamp(),
            ..Self::default()
        }
    }

    pub fn result_label(&self) -> &'static str {
        match (&self.skipped, &self.outcome) {
            (Some(_), _) => "skipped",
            (None, Some(outcome)) => outcome.kind(),
            (None, None) => "none",
        }
    }

    pub fn alert_errors(&self) -> Vec<&str> {
        self.delivery
            .iter()
            .filter_map(|d| d.error.as_deref())
            .collect()
    }
}

/// Runs one tick for `symbol`: rehydrate the open order (or the last close when
/// none is open), classify the intraday series, advance the lifecycle, persist,
/// then alert. Never fails; every problem ends up in the report.
pub fn evaluate_symbol(
    config: &Config,
    symbol: &str,
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> EvaluationReport {
    let _span = info_span!("app.evaluate", symbol = %symbol).entered();
    let started = Instant::now();
    let mut report = EvaluationReport::new(symbol, now);

    let series = match load_intraday(config, deps.feed, symbol) {
        Ok(series) => series,
        Err(err) => {
            tracing::warn!(symbol = %symbol, error = %err, "skipping symbol for this tick");
            report.skipped = Some(err);
            finish(&report, started);
            return report;
        }
    };
    let [m5, m15, m30] = &series;
    let frames = TimeframeSet {
        m5,
        m15,
        m30,
    };

    let current = match deps.store.get_open_order(symbol) {
        Ok(order) => order,
        Err(err) => {
            tracing::error!(symbol = %symbol, error = %err, "failed to load open order");
            report.persistence_errors.push(err);
            None
        }
    };

    let last_closed_at = if current.is_none() {
        match deps.store.last_closed_at(symbol) {
            Ok(closed_at) => closed_at,
            Err(err) => {
                tracing::error!(symbol = %symbol, error = %err, "failed to load last close");
                report.persistence_errors.push(err);
                None
            }
        }
    } else {
        None
    };

    let manager = OrderLifecycleManager::new(config.trading.lifecycle_policy());
    let outcome = manager.evaluate(current, last_closed_at, &frames, now.hour());
    tracing::info!(
        symbol = %symbol,
        outcome = outcome.kind(),
        m5 = %m5.latest_momentum(),
        m15 = %m15.latest_momentum(),
        m30 = %m30.latest_momentum(),
        "lifecycle evaluated"
    );

    persist(deps.store, &outcome, &mut report.persistence_errors);

    if let Some(alert) = alert_for_outcome(&outcome) {
        report.delivery = Some(deliver_alert(
            deps.store,
            deps.alerts,
            &alert,
            now.timestamp(),
        ));
        report.alert = Some(alert);
    }

    report.outcome = Some(outcome);
    finish(&report, started);
    report
}

pub fn evaluate_all(
    config: &Config,
    symbols: &[String],
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> Vec<EvaluationReport> {
    symbols
        .iter()
        .map(|symbol| evaluate_symbol(config, symbol, deps, now))
        .collect()
}

fn load_intraday(
    config: &Config,
    feed: &dyn MarketDataFeed,
    symbol: &str,
) -> Result<[ClassifiedSeries; 3], String> {
    Ok([
        load_series(config, feed, symbol, Interval::FiveMinutes)?,
        load_series(config, feed, symbol, Interval::FifteenMinutes)?,
        load_series(config, feed, symbol, Interval::ThirtyMinutes)?,
    ])
}

fn persist(store: &dyn OrderStore, outcome: &LifecycleOutcome, errors: &mut Vec<String>) {
    let started = Instant::now();
    let result = match outcome {
        LifecycleOutcome::Opened { order } | LifecycleOutcome::Refreshed { order } => {
            store.upsert_open_order(order)
        }
        LifecycleOutcome::Closed { order, close } => {
            // Both writes are attempted; a failed retire must not hide the close row.
            let retired = store.close_open_order(order);
            let inserted = store.insert_close_order(close);
            retired.and(inserted)
        }
        _ => return,
    };
    metrics::histogram!("confluence.evaluate.persist_ms")
        .record(started.elapsed().as_millis() as f64);
    if let Err(err) = result {
        metrics::counter!("confluence.evaluate.persistence_errors_total").increment(1);
        tracing::error!(outcome = outcome.kind(), error = %err, "failed to persist order state");
        errors.push(err);
    }
}

fn finish(report: &EvaluationReport, started: Instant) {
    metrics::counter!("confluence.evaluate.calls_total", "result" => report.result_label())
        .increment(1);
    metrics::histogram!("confluence.evaluate.duration_ms")
        .record(started.elapsed().as_millis() as f64);
}
