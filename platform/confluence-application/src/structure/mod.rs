use crate::config::Config;
use crate::evaluation::{AlertDelivery, EvaluationDeps};
use crate::shared::{deliver_alert, load_series};
use chrono::{DateTime, Utc};
use confluence_domain::services::alerts::alert_for_shift;
use confluence_domain::services::structure::{detect_structure_shift, StructureShift};
use confluence_domain::value_objects::interval::Interval;
use serde::Serialize;
use tracing::info_span;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StructureReport {
    pub symbol: String,
    pub evaluated_at: i64,
    pub shift: Option<StructureShift>,
    pub skipped: Option<String>,
    pub delivery: Option<AlertDelivery>,
}

/// Higher-timeframe pass: looks for a fresh 1h breakout confirmed by 4h and
/// alerts once per 1h bar. Holds no order state.
pub fn evaluate_structure(
    config: &Config,
    symbol: &str,
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> StructureReport {
    let _span = info_span!("app.structure", symbol = %symbol).entered();
    let mut report = StructureReport {
        symbol: symbol.to_string(),
        evaluated_at: now.timestamp(),
        ..StructureReport::default()
    };

    let loaded = load_series(config, deps.feed, symbol, Interval::OneHour).and_then(|h1| {
        load_series(config, deps.feed, symbol, Interval::FourHours).map(|h4| (h1, h4))
    });
    let (h1, h4) = match loaded {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(symbol = %symbol, error = %err, "skipping structure check");
            metrics::counter!("confluence.structure.calls_total", "result" => "skipped")
                .increment(1);
            report.skipped = Some(err);
            return report;
        }
    };

    let Some(shift) = detect_structure_shift(&h1, &h4) else {
        metrics::counter!("confluence.structure.calls_total", "result" => "none").increment(1);
        return report;
    };
    tracing::info!(symbol = %symbol, direction = %shift.direction, "structure shift");
    metrics::counter!("confluence.structure.calls_total", "result" => "shift").increment(1);

    let alert = alert_for_shift(&shift);
    report.delivery = Some(deliver_alert(
        deps.store,
        deps.alerts,
        &alert,
        now.timestamp(),
    ));
    report.shift = Some(shift);
    report
}

pub fn evaluate_structure_all(
    config: &Config,
    symbols: &[String],
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> Vec<StructureReport> {
    symbols
        .iter()
        .map(|symbol| evaluate_structure(config, symbol, deps, now))
        .collect()
}
