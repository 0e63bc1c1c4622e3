use confluence_application::config::LogConfig;
use std::net::SocketAddr;

pub const LOG_ENV: &str = "CONFLUENCE_LOG";

/// Filter precedence: `CONFLUENCE_LOG`, then `log.level`, then `info`.
pub fn log_filter(env_value: Option<String>, log: Option<&LogConfig>) -> String {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| log.and_then(|l| l.level.clone()))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Logs go to stderr; stdout carries the JSON command output.
pub fn init_tracing(log: Option<&LogConfig>) -> Result<(), String> {
    let filter = log_filter(std::env::var(LOG_ENV).ok(), log);
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|err| format!("invalid log filter '{filter}': {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let format = log.and_then(|l| l.format.as_deref()).unwrap_or("text");
    let installed = match format.trim().to_lowercase().as_str() {
        "text" => builder.try_init(),
        "json" => builder.json().try_init(),
        other => return Err(format!("unsupported log.format '{other}' (expected text or json)")),
    };
    installed.map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

/// `--metrics-addr` (or `CONFLUENCE_METRICS_ADDR`); blank disables the exporter.
pub fn metrics_addr(flag: Option<String>) -> Result<Option<SocketAddr>, String> {
    let Some(raw) = flag else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|err| format!("invalid metrics address '{raw}' (expected host:port): {err}"))
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(addr) = addr else {
        return Ok(None);
    };
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    if let Some(addr) = addr {
        tracing::warn!(metrics_addr = %addr, "built without the prometheus feature; metrics address ignored");
    }
    Ok(None)
}
