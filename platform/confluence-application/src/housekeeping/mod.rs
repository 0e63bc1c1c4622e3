use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use confluence_domain::repositories::orders::OrderStore;
use std::time::Instant;
use tracing::info_span;

pub fn retention_cutoff(config: &Config, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(config.retention.keep_days))
}

/// Drops ledger rows and retired orders older than the retention horizon.
pub fn purge(
    config: &Config,
    store: &dyn OrderStore,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, String> {
    let cutoff = retention_cutoff(config, now);
    let _span = info_span!(
        "app.purge",
        keep_days = config.retention.keep_days,
        cutoff = %cutoff.to_rfc3339()
    )
    .entered();

    let started = Instant::now();
    let removed = store
        .purge_older_than(cutoff.timestamp())
        .map_err(|err| format!("failed to purge records older than {}: {err}", cutoff.to_rfc3339()))?;
    metrics::histogram!("confluence.purge.duration_ms")
        .record(started.elapsed().as_millis() as f64);
    metrics::counter!("confluence.purge.rows_total").increment(removed);
    tracing::info!(removed, "purge complete");

    Ok(serde_json::json!({
        "cutoff": cutoff.to_rfc3339(),
        "cutoff_unixtime": cutoff.timestamp(),
        "removed": removed,
    }))
}
