use confluence_domain::services::lifecycle::LifecyclePolicy;
use confluence_domain::services::signal::MIN_BARS_FOR_SIGNAL;
use confluence_domain::value_objects::bar::offset_from_minutes;
use confluence_domain::value_objects::interval::Interval;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Yahoo,
    Csv,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertsKind {
    Telegram,
    Log,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    pub feed: FeedConfig,
    pub db: DbConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub symbols: Vec<String>,
    /// Exchange-local clock used for the hour/minute fields on bars and alerts.
    #[serde(default = "default_timezone_offset_minutes")]
    pub timezone_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TradingConfig {
    #[serde(default = "default_cutoff_hour_utc")]
    pub cutoff_hour_utc: u32,
    #[serde(default = "default_keep_bars_5m")]
    pub keep_bars_5m: usize,
    #[serde(default = "default_keep_bars_15m")]
    pub keep_bars_15m: usize,
    #[serde(default = "default_keep_bars_30m")]
    pub keep_bars_30m: usize,
    #[serde(default = "default_keep_bars_1h")]
    pub keep_bars_1h: usize,
    #[serde(default = "default_keep_bars_4h")]
    pub keep_bars_4h: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            cutoff_hour_utc: default_cutoff_hour_utc(),
            keep_bars_5m: default_keep_bars_5m(),
            keep_bars_15m: default_keep_bars_15m(),
            keep_bars_30m: default_keep_bars_30m(),
            keep_bars_1h: default_keep_bars_1h(),
            keep_bars_4h: default_keep_bars_4h(),
        }
    }
}

impl TradingConfig {
    pub fn keep_bars(&self, interval: Interval) -> usize {
        match interval {
            Interval::FiveMinutes => self.keep_bars_5m,
            Interval::FifteenMinutes => self.keep_bars_15m,
            Interval::ThirtyMinutes => self.keep_bars_30m,
            Interval::OneHour => self.keep_bars_1h,
            Interval::FourHours => self.keep_bars_4h,
        }
    }

    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            cutoff_hour_utc: self.cutoff_hour_utc,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub base_url: Option<String>,
    pub csv_dir: Option<String>,
    pub lookback_days: Option<u32>,
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub drop_incomplete: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    pub kind: DbKind,
    pub url: Option<String>,
    pub pool_max_size: Option<u32>,
    /// Bound on one connection checkout, in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    #[serde(default = "default_open_orders_table")]
    pub open_orders_table: String,
    #[serde(default = "default_close_orders_table")]
    pub close_orders_table: String,
    #[serde(default = "default_alerts_table")]
    pub alerts_table: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    pub kind: AlertsKind,
    pub token: Option<String>,
    pub chat_id: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_days: default_keep_days(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

fn default_timezone_offset_minutes() -> i32 {
    -240
}

fn default_cutoff_hour_utc() -> u32 {
    20
}

fn default_keep_bars_5m() -> usize {
    25
}

fn default_keep_bars_15m() -> usize {
    20
}

fn default_keep_bars_30m() -> usize {
    10
}

fn default_keep_bars_1h() -> usize {
    10
}

fn default_keep_bars_4h() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_open_orders_table() -> String {
    "stock_open_orders".to_string()
}

fn default_close_orders_table() -> String {
    "stock_close_orders".to_string()
}

fn default_alerts_table() -> String {
    "alert_ledger".to_string()
}

fn default_keep_days() -> u32 {
    1
}

impl Config {
    pub fn offset(&self) -> FixedOffset {
        offset_from_minutes(self.run.timezone_offset_minutes)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.run.symbols.is_empty() {
            return Err("run.symbols must list at least one symbol".to_string());
        }
        if let Some(blank) = self.run.symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(format!("run.symbols[{blank}] is empty"));
        }
        if self.run.timezone_offset_minutes.abs() >= 24 * 60 {
            return Err(format!(
                "run.timezone_offset_minutes out of range: {}",
                self.run.timezone_offset_minutes
            ));
        }
        if self.trading.cutoff_hour_utc > 23 {
            return Err(format!(
                "trading.cutoff_hour_utc must be 0..=23 (got {})",
                self.trading.cutoff_hour_utc
            ));
        }
        for interval in [
            Interval::FiveMinutes,
            Interval::FifteenMinutes,
            Interval::ThirtyMinutes,
        ] {
            let keep = self.trading.keep_bars(interval);
            if keep < MIN_BARS_FOR_SIGNAL {
                return Err(format!(
                    "trading.keep_bars_{} must be >= {MIN_BARS_FOR_SIGNAL} (got {keep})",
                    interval.label()
                ));
            }
        }
        for interval in [Interval::OneHour, Interval::FourHours] {
            let keep = self.trading.keep_bars(interval);
            if keep < 2 {
                return Err(format!(
                    "trading.keep_bars_{} must be >= 2 (got {keep})",
                    interval.label()
                ));
            }
        }
        if self.feed.kind == FeedKind::Csv && self.feed.csv_dir.is_none() {
            return Err("feed.csv_dir is required when feed.kind = \"csv\"".to_string());
        }
        if self.db.pool_max_size == Some(0) {
            return Err("db.pool_max_size must be > 0".to_string());
        }
        if self.db.connect_timeout_ms == Some(0) {
            return Err("db.connect_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    config
        .validate()
        .map_err(|err| format!("invalid config {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}
