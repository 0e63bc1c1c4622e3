use confluence_application::config::{AlertsKind, Config, DbKind, FeedKind};
use confluence_application::evaluation::EvaluationDeps;
use confluence_domain::repositories::alerts::AlertSink;
use confluence_domain::repositories::market_data::MarketDataFeed;
use confluence_domain::repositories::orders::OrderStore;
use confluence_infrastructure::alerts::log::LogAlertSink;
use confluence_infrastructure::alerts::telegram::TelegramAlertSink;
use confluence_infrastructure::market_data::csv_files::CsvBarFeed;
use confluence_infrastructure::market_data::yahoo::YahooChartFeed;
use confluence_infrastructure::persistence::memory::InMemoryOrderStore;
use confluence_infrastructure::persistence::postgres_orders::{OrderTables, PostgresOrderStore};
use std::time::Duration;

pub const DB_URL_ENV: &str = "CONFLUENCE_DB_URL";
pub const TELEGRAM_TOKEN_ENV: &str = "TELE_TOKEN";
pub const TELEGRAM_CHAT_ENV: &str = "TELE_CHAT_ID";

const DEFAULT_LOOKBACK_DAYS: u32 = 4;
const DEFAULT_FEED_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_ALERT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POOL_MAX_SIZE: u32 = 4;
const DEFAULT_DB_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// The three adapters selected by the config.
pub struct Adapters {
    pub feed: Box<dyn MarketDataFeed>,
    pub store: Box<dyn OrderStore>,
    pub alerts: Box<dyn AlertSink>,
}

impl Adapters {
    pub fn build(config: &Config) -> Result<Self, String> {
        Ok(Self {
            feed: build_feed(config)?,
            store: build_store(config)?,
            alerts: build_alerts(config)?,
        })
    }

    pub fn deps(&self) -> EvaluationDeps<'_> {
        EvaluationDeps {
            feed: self.feed.as_ref(),
            store: self.store.as_ref(),
            alerts: self.alerts.as_ref(),
        }
    }
}

/// A config value wins over the environment; blanks count as missing.
pub fn config_or_env(value: Option<&str>, env_value: Option<String>) -> Option<String> {
    value
        .map(str::to_string)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env_value.filter(|v| !v.trim().is_empty()))
}

pub fn build_feed(config: &Config) -> Result<Box<dyn MarketDataFeed>, String> {
    match config.feed.kind {
        FeedKind::Yahoo => {
            let feed = YahooChartFeed::new(
                config.feed.base_url.clone(),
                config.feed.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
                config.feed.timeout_ms.unwrap_or(DEFAULT_FEED_TIMEOUT_MS),
                config.offset(),
                config.feed.drop_incomplete,
            )?;
            Ok(Box::new(feed))
        }
        FeedKind::Csv => {
            let dir = config
                .feed
                .csv_dir
                .as_deref()
                .ok_or_else(|| "feed.csv_dir is required when feed.kind = \"csv\"".to_string())?;
            Ok(Box::new(CsvBarFeed::new(dir, config.offset())))
        }
    }
}

pub fn build_store(config: &Config) -> Result<Box<dyn OrderStore>, String> {
    match config.db.kind {
        DbKind::Memory => Ok(Box::new(InMemoryOrderStore::new())),
        DbKind::Postgres => {
            let db_url = config_or_env(config.db.url.as_deref(), std::env::var(DB_URL_ENV).ok())
                .ok_or_else(|| {
                    format!("missing db.url in config and env {DB_URL_ENV} is not set")
                })?;
            let tables = OrderTables {
                open_orders: config.db.open_orders_table.clone(),
                close_orders: config.db.close_orders_table.clone(),
                alerts: config.db.alerts_table.clone(),
            };
            let connect_timeout = Duration::from_millis(
                config
                    .db
                    .connect_timeout_ms
                    .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_MS)
                    .max(1),
            );
            let store = PostgresOrderStore::new(
                &db_url,
                tables,
                config.db.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
                connect_timeout,
            )?;
            // A database outage must not stop evaluation; each store call
            // reports its own error into the evaluation report.
            if let Err(err) = store.migrate() {
                metrics::counter!("confluence.infra.postgres.migrate_failures_total").increment(1);
                tracing::warn!(error = %err, "postgres schema migration failed; continuing");
            }
            Ok(Box::new(store))
        }
    }
}

pub fn build_alerts(config: &Config) -> Result<Box<dyn AlertSink>, String> {
    match config.alerts.kind {
        AlertsKind::Log => Ok(Box::new(LogAlertSink)),
        AlertsKind::Telegram => {
            let token = config_or_env(
                config.alerts.token.as_deref(),
                std::env::var(TELEGRAM_TOKEN_ENV).ok(),
            )
            .ok_or_else(|| {
                format!("missing alerts.token in config and env {TELEGRAM_TOKEN_ENV} is not set")
            })?;
            let chat_id = config_or_env(
                config.alerts.chat_id.as_deref(),
                std::env::var(TELEGRAM_CHAT_ENV).ok(),
            )
            .ok_or_else(|| {
                format!("missing alerts.chat_id in config and env {TELEGRAM_CHAT_ENV} is not set")
            })?;
            let sink = TelegramAlertSink::new(
                &token,
                chat_id,
                config.alerts.base_url.clone(),
                config.alerts.timeout_ms.unwrap_or(DEFAULT_ALERT_TIMEOUT_MS),
            )?;
            Ok(Box::new(sink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{config_or_env, Adapters};
    use confluence_application::config::Config;

    fn dry_run_config() -> Config {
        toml::from_str(
            r#"
[run]
symbols = ["SPY"]

[feed]
kind = "csv"
csv_dir = "fixtures"

[db]
kind = "memory"

[alerts]
kind = "log"
"#,
        )
        .expect("parse config")
    }

    #[test]
    fn config_value_beats_env_and_blanks_are_missing() {
        assert_eq!(
            config_or_env(Some("postgres://cfg"), Some("postgres://env".to_string())),
            Some("postgres://cfg".to_string())
        );
        assert_eq!(
            config_or_env(Some(" "), Some("postgres://env".to_string())),
            Some("postgres://env".to_string())
        );
        assert_eq!(config_or_env(None, Some(String::new())), None);
    }

    #[test]
    fn dry_run_adapters_build_without_network() {
        let adapters = Adapters::build(&dry_run_config()).expect("adapters");
        let deps = adapters.deps();
        assert!(deps.store.get_open_order("SPY").unwrap().is_none());
        assert!(deps.alerts.notify("hello").is_ok());
    }
}
