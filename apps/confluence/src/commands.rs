use crate::infra::Adapters;
use chrono::{DateTime, Utc};
use confluence_application::config::{to_toml_pretty, Config};
use confluence_application::evaluation::{evaluate_all, EvaluationDeps, EvaluationReport};
use confluence_application::housekeeping::purge;
use confluence_application::structure::evaluate_structure_all;
use confluence_application::validation::probe_feed;
use std::thread;
use std::time::{Duration, Instant};

pub enum Command {
    Evaluate { symbol: Option<String> },
    Structure,
    Purge,
    Watch {
        every_secs: u64,
        max_ticks: Option<u64>,
        with_structure: bool,
    },
    Validate { probe_feed: bool, strict: bool },
}

/// Runs one command and prints its JSON result on stdout, one object per line.
pub fn run(config: &Config, command: Command) -> Result<(), String> {
    let adapters = Adapters::build(config)?;
    let deps = adapters.deps();
    match command {
        Command::Evaluate { symbol } => {
            let symbols = target_symbols(config, symbol);
            print_json(&evaluate_payload(config, &symbols, deps, Utc::now()));
        }
        Command::Structure => print_json(&structure_payload(config, deps, Utc::now())),
        Command::Purge => {
            let result = purge(config, deps.store, Utc::now())?;
            print_json(&serde_json::json!({
                "status": "ok",
                "mode": "purge",
                "result": result,
            }));
        }
        Command::Watch {
            every_secs,
            max_ticks,
            with_structure,
        } => watch(config, deps, every_secs, max_ticks, with_structure),
        Command::Validate { probe_feed, strict } => {
            print_json(&validate_payload(config, deps, probe_feed, strict)?)
        }
    }
    Ok(())
}

fn target_symbols(config: &Config, symbol: Option<String>) -> Vec<String> {
    match symbol {
        Some(symbol) if !symbol.trim().is_empty() => vec![symbol.trim().to_string()],
        _ => config.run.symbols.clone(),
    }
}

pub fn evaluate_payload(
    config: &Config,
    symbols: &[String],
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> serde_json::Value {
    let reports = evaluate_all(config, symbols, deps, now);
    serde_json::json!({
        "status": "ok",
        "mode": "evaluate",
        "evaluated_at": now.to_rfc3339(),
        "summary": summarize(&reports),
        "reports": reports,
    })
}

pub fn structure_payload(
    config: &Config,
    deps: EvaluationDeps<'_>,
    now: DateTime<Utc>,
) -> serde_json::Value {
    let reports = evaluate_structure_all(config, &config.run.symbols, deps, now);
    let shifts = reports.iter().filter(|r| r.shift.is_some()).count();
    serde_json::json!({
        "status": "ok",
        "mode": "structure",
        "evaluated_at": now.to_rfc3339(),
        "shifts": shifts,
        "reports": reports,
    })
}

fn summarize(reports: &[EvaluationReport]) -> serde_json::Value {
    let mut summary = serde_json::Map::new();
    for report in reports {
        summary.insert(
            report.symbol.clone(),
            serde_json::Value::String(report.result_label().to_string()),
        );
    }
    serde_json::Value::Object(summary)
}

fn watch(
    config: &Config,
    deps: EvaluationDeps<'_>,
    every_secs: u64,
    max_ticks: Option<u64>,
    with_structure: bool,
) {
    let cadence = Duration::from_secs(every_secs.max(1));
    let mut tick = 0u64;
    tracing::info!(every_secs = cadence.as_secs(), ?max_ticks, "watch started");
    loop {
        tick += 1;
        let started = Instant::now();
        let now = Utc::now();
        print_json(&evaluate_payload(config, &config.run.symbols, deps, now));
        if with_structure {
            print_json(&structure_payload(config, deps, now));
        }
        metrics::counter!("confluence.watch.ticks_total").increment(1);

        if max_ticks.is_some_and(|max| tick >= max) {
            tracing::info!(ticks = tick, "watch finished");
            return;
        }
        let elapsed = started.elapsed();
        if elapsed < cadence {
            thread::sleep(cadence - elapsed);
        } else {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "tick took longer than the watch cadence"
            );
        }
    }
}

pub fn validate_payload(
    config: &Config,
    deps: EvaluationDeps<'_>,
    probe: bool,
    strict: bool,
) -> Result<serde_json::Value, String> {
    let probe_result = if probe {
        Some(probe_feed(config, deps.feed, strict)?)
    } else {
        None
    };
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "validate",
        "strict": strict,
        "symbols": config.run.symbols,
        "feed": config.feed.kind,
        "db": config.db.kind,
        "alerts": config.alerts.kind,
        "config_toml": to_toml_pretty(config)?,
        "probe": probe_result,
    }))
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string(value)
            .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::{evaluate_payload, target_symbols, validate_payload};
    use crate::infra::Adapters;
    use chrono::{TimeZone, Utc};
    use confluence_application::config::Config;
    use confluence_domain::value_objects::interval::Interval;
    use std::fs;
    use std::path::Path;

    // 2025-12-17 12:00 UTC
    const T0: i64 = 1_765_972_800;

    /// 30 flat bars at 100 followed by `tail`, as `timestamp_utc,open,high,low,close` rows.
    fn write_bars(dir: &Path, interval: Interval, tail: [f64; 3]) {
        let mut closes = vec![100.0; 30];
        closes.extend(tail.iter().map(|delta| 100.0 + delta));
        let mut csv = String::from("timestamp_utc,open,high,low,close\n");
        let mut prev = 100.0_f64;
        for (idx, close) in closes.into_iter().enumerate() {
            let open = prev;
            prev = close;
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                T0 + idx as i64 * interval.step_seconds(),
                open,
                open.max(close) + 0.25,
                open.min(close) - 0.25,
                close
            ));
        }
        fs::write(dir.join(format!("SPY_{}.csv", interval.label())), csv).expect("write bars");
    }

    fn config_with_missing_fixtures() -> Config {
        let dir = std::env::temp_dir().join(format!("confluence_cmd_{}", std::process::id()));
        toml::from_str(&format!(
            r#"
[run]
symbols = ["SPY", "QQQ"]

[feed]
kind = "csv"
csv_dir = "{}"

[db]
kind = "memory"

[alerts]
kind = "log"
"#,
            dir.display().to_string().replace('\\', "/")
        ))
        .expect("parse config")
    }

    #[test]
    fn symbol_flag_narrows_the_run() {
        let config = config_with_missing_fixtures();
        assert_eq!(target_symbols(&config, Some(" IWM ".to_string())), vec!["IWM"]);
        assert_eq!(target_symbols(&config, None), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn missing_feed_data_skips_symbols_without_failing_the_run() {
        let config = config_with_missing_fixtures();
        let adapters = Adapters::build(&config).expect("adapters");
        let now = Utc.with_ymd_and_hms(2025, 12, 17, 15, 0, 0).unwrap();
        let payload = evaluate_payload(&config, &config.run.symbols, adapters.deps(), now);

        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["summary"]["SPY"], "skipped");
        assert_eq!(payload["summary"]["QQQ"], "skipped");
        assert_eq!(payload["reports"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn strict_probe_fails_when_series_are_unusable() {
        let config = config_with_missing_fixtures();
        let adapters = Adapters::build(&config).expect("adapters");
        let lenient = validate_payload(&config, adapters.deps(), true, false).expect("lenient probe");
        assert_eq!(lenient["probe"]["unusable"], 10);
        assert_eq!(lenient["feed"], "csv");

        let err = validate_payload(&config, adapters.deps(), true, true).unwrap_err();
        assert!(err.contains("strict validation failed"), "{err}");
    }

    #[test]
    fn unreachable_database_still_evaluates_and_alerts() {
        let dir = std::env::temp_dir().join(format!("confluence_db_down_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create tmp dir");
        write_bars(&dir, Interval::FiveMinutes, [1.0, 3.0, 6.0]);
        write_bars(&dir, Interval::FifteenMinutes, [1.0, 3.0, 6.0]);
        write_bars(&dir, Interval::ThirtyMinutes, [0.0, 0.0, 0.0]);

        let config: Config = toml::from_str(&format!(
            r#"
[run]
symbols = ["SPY"]
timezone_offset_minutes = -300

[feed]
kind = "csv"
csv_dir = "{}"

[db]
kind = "postgres"
url = "postgres://confluence@127.0.0.1:1/confluence"
pool_max_size = 1
connect_timeout_ms = 200

[alerts]
kind = "log"
"#,
            dir.display().to_string().replace('\\', "/")
        ))
        .expect("parse config");

        let adapters = Adapters::build(&config).expect("adapters build while the database is down");
        let now = Utc.with_ymd_and_hms(2025, 12, 17, 15, 0, 0).unwrap();
        let payload = evaluate_payload(&config, &config.run.symbols, adapters.deps(), now);

        assert_eq!(payload["summary"]["SPY"], "opened");
        let report = &payload["reports"][0];
        assert!(!report["persistence_errors"].as_array().expect("errors").is_empty());
        assert_eq!(report["delivery"]["sent"], true);
        assert_eq!(report["alert"]["kind"], "open");
    }
}
