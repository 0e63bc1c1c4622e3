use super::validate_table_name;
use confluence_domain::repositories::orders::{AlertRecord, OrderStore};
use confluence_domain::value_objects::direction::Direction;
use confluence_domain::value_objects::order::{CloseOrder, OpenOrder};
use confluence_domain::value_objects::pattern::{EngulfingTag, FvgTag, SecondaryTags};
use postgres::{NoTls, Row};
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::time::{Duration, Instant};

const STATE_OPEN: &str = "Open";
const STATE_OPEN_CLOSE: &str = "OpenClose";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTables {
    pub open_orders: String,
    pub close_orders: String,
    pub alerts: String,
}

impl OrderTables {
    fn validate(&self) -> Result<(), String> {
        for (role, table) in [
            ("open_orders_table", &self.open_orders),
            ("close_orders_table", &self.close_orders),
            ("alerts_table", &self.alerts),
        ] {
            validate_table_name(table).map_err(|err| format!("invalid {role} '{table}': {err}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Pool<PostgresConnectionManager<NoTls>>,
    tables: OrderTables,
}

impl PostgresOrderStore {
    /// Builds the pool without connecting; an unreachable database surfaces as
    /// per-call errors once `connect_timeout` elapses on checkout.
    pub fn new(
        db_url: &str,
        tables: OrderTables,
        pool_max_size: u32,
        connect_timeout: Duration,
    ) -> Result<Self, String> {
        tables.validate()?;
        let mut config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        config.connect_timeout(connect_timeout);
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size)
            .connection_timeout(connect_timeout)
            .build_unchecked(manager);
        Ok(Self { pool, tables })
    }

    /// Creates the three tables when missing. Idempotent.
    pub fn migrate(&self) -> Result<(), String> {
        let statements = schema_sql(&self.tables);
        self.run("migrate", |client| client.batch_execute(&statements))
    }

    fn run<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut postgres::Client) -> Result<T, postgres::Error>,
    ) -> Result<T, String> {
        let span = tracing::info_span!("infra.postgres.query", op = op);
        let _enter = span.enter();

        let get_start = Instant::now();
        let mut client = match self.pool.get() {
            Ok(client) => client,
            Err(err) => {
                metrics::counter!("confluence.infra.postgres.calls_total", "op" => op, "result" => "err")
                    .increment(1);
                metrics::counter!("confluence.infra.postgres.pool.get.errors_total").increment(1);
                tracing::error!(error = %err, "failed to checkout postgres connection");
                return Err(format!("failed to checkout postgres connection: {err}"));
            }
        };
        metrics::histogram!("confluence.infra.postgres.pool.get_ms")
            .record(get_start.elapsed().as_secs_f64() * 1000.0);

        let query_start = Instant::now();
        let result = f(&mut *client);
        metrics::histogram!("confluence.infra.postgres.query_ms", "op" => op)
            .record(query_start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(value) => {
                metrics::counter!("confluence.infra.postgres.calls_total", "op" => op, "result" => "ok")
                    .increment(1);
                Ok(value)
            }
            Err(err) => {
                metrics::counter!("confluence.infra.postgres.calls_total", "op" => op, "result" => "err")
                    .increment(1);
                tracing::error!(error = %err, "postgres {op} failed");
                Err(format!("postgres {op} failed: {err}"))
            }
        }
    }
}

fn schema_sql(tables: &OrderTables) -> String {
    let open_index = format!("{}_one_open", tables.open_orders.replace('.', "_"));
    format!(
        "CREATE TABLE IF NOT EXISTS {open} (\
            symbol TEXT NOT NULL, \
            created_at BIGINT NOT NULL, \
            direction TEXT NOT NULL, \
            entry_price DOUBLE PRECISION NOT NULL, \
            stop_loss DOUBLE PRECISION NOT NULL, \
            profit_target DOUBLE PRECISION NOT NULL, \
            last_updated_at BIGINT NOT NULL, \
            hour INTEGER NOT NULL, \
            minute INTEGER NOT NULL, \
            engulfing TEXT NOT NULL, \
            fvg TEXT NOT NULL, \
            trans_state TEXT NOT NULL DEFAULT '{STATE_OPEN}', \
            PRIMARY KEY (symbol, created_at));\n\
         CREATE UNIQUE INDEX IF NOT EXISTS {open_index} ON {open} (symbol) WHERE trans_state = '{STATE_OPEN}';\n\
         CREATE TABLE IF NOT EXISTS {close} (\
            symbol TEXT NOT NULL, \
            unixtime BIGINT NOT NULL, \
            direction_at_close TEXT NOT NULL, \
            exit_price DOUBLE PRECISION NOT NULL, \
            stop_loss DOUBLE PRECISION NOT NULL, \
            profit_target DOUBLE PRECISION NOT NULL, \
            hour INTEGER NOT NULL, \
            minute INTEGER NOT NULL, \
            PRIMARY KEY (symbol, unixtime));\n\
         CREATE TABLE IF NOT EXISTS {alerts} (\
            symbol TEXT NOT NULL, \
            interval_key TEXT NOT NULL, \
            bar_timestamp BIGINT NOT NULL, \
            message TEXT NOT NULL, \
            sent_at BIGINT NOT NULL, \
            PRIMARY KEY (symbol, interval_key, bar_timestamp));",
        open = tables.open_orders,
        close = tables.close_orders,
        alerts = tables.alerts,
    )
}

fn select_open_sql(table: &str) -> String {
    format!(
        "SELECT symbol, created_at, direction, entry_price, stop_loss, profit_target, \
         last_updated_at, hour, minute, engulfing, fvg FROM {table} \
         WHERE symbol = $1 AND trans_state = '{STATE_OPEN}' \
         ORDER BY created_at DESC LIMIT 1"
    )
}

fn upsert_open_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} AS o (symbol, created_at, direction, entry_price, stop_loss, profit_target, \
         last_updated_at, hour, minute, engulfing, fvg, trans_state) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, '{STATE_OPEN}') \
         ON CONFLICT (symbol, created_at) DO UPDATE SET \
         stop_loss = EXCLUDED.stop_loss, profit_target = EXCLUDED.profit_target, \
         last_updated_at = EXCLUDED.last_updated_at, hour = EXCLUDED.hour, \
         minute = EXCLUDED.minute, engulfing = EXCLUDED.engulfing, fvg = EXCLUDED.fvg \
         WHERE o.trans_state = '{STATE_OPEN}'"
    )
}

fn retire_open_sql(table: &str) -> String {
    format!(
        "UPDATE {table} SET trans_state = '{STATE_OPEN_CLOSE}' \
         WHERE symbol = $1 AND created_at = $2"
    )
}

fn insert_close_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (symbol, unixtime, direction_at_close, exit_price, stop_loss, \
         profit_target, hour, minute) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (symbol, unixtime) DO NOTHING"
    )
}

fn last_closed_sql(tables: &OrderTables) -> String {
    format!(
        "SELECT GREATEST(\
         (SELECT MAX(unixtime) FROM {close} WHERE symbol = $1), \
         (SELECT MAX(last_updated_at) FROM {open} WHERE symbol = $1 AND trans_state = '{STATE_OPEN_CLOSE}'))",
        close = tables.close_orders,
        open = tables.open_orders,
    )
}

fn row_to_open_order(row: &Row) -> Result<OpenOrder, String> {
    let direction: String = row.get(2);
    let engulfing: String = row.get(9);
    let fvg: String = row.get(10);
    let hour: i32 = row.get(7);
    let minute: i32 = row.get(8);
    Ok(OpenOrder {
        symbol: row.get(0),
        created_at: row.get(1),
        direction: Direction::parse(&direction)?,
        entry_price: row.get(3),
        stop_loss: row.get(4),
        profit_target: row.get(5),
        last_updated_at: row.get(6),
        hour: u32::try_from(hour).map_err(|_| format!("invalid stored hour: {hour}"))?,
        minute: u32::try_from(minute).map_err(|_| format!("invalid stored minute: {minute}"))?,
        secondary_tags: SecondaryTags {
            engulfing: EngulfingTag::parse(&engulfing)?,
            fvg: FvgTag::parse(&fvg)?,
        },
    })
}

fn clock_field(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl OrderStore for PostgresOrderStore {
    fn get_open_order(&self, symbol: &str) -> Result<Option<OpenOrder>, String> {
        let sql = select_open_sql(&self.tables.open_orders);
        let row = self.run("get_open_order", |client| client.query_opt(&sql, &[&symbol]))?;
        row.as_ref().map(row_to_open_order).transpose()
    }

    fn upsert_open_order(&self, order: &OpenOrder) -> Result<(), String> {
        let sql = upsert_open_sql(&self.tables.open_orders);
        let updated = self.run("upsert_open_order", |client| {
            client.execute(
                &sql,
                &[
                    &order.symbol,
                    &order.created_at,
                    &order.direction.as_str(),
                    &order.entry_price,
                    &order.stop_loss,
                    &order.profit_target,
                    &order.last_updated_at,
                    &clock_field(order.hour),
                    &clock_field(order.minute),
                    &order.secondary_tags.engulfing.as_str(),
                    &order.secondary_tags.fvg.as_str(),
                ],
            )
        })?;
        if updated == 0 {
            return Err(format!(
                "order {}@{} is already closed",
                order.symbol, order.created_at
            ));
        }
        Ok(())
    }

    fn close_open_order(&self, order: &OpenOrder) -> Result<(), String> {
        let sql = retire_open_sql(&self.tables.open_orders);
        self.run("close_open_order", |client| {
            client.execute(&sql, &[&order.symbol, &order.created_at])
        })?;
        Ok(())
    }

    fn insert_close_order(&self, close: &CloseOrder) -> Result<(), String> {
        let sql = insert_close_sql(&self.tables.close_orders);
        self.run("insert_close_order", |client| {
            client.execute(
                &sql,
                &[
                    &close.symbol,
                    &close.unixtime,
                    &close.direction_at_close.as_str(),
                    &close.exit_price,
                    &close.stop_loss,
                    &close.profit_target,
                    &clock_field(close.hour),
                    &clock_field(close.minute),
                ],
            )
        })?;
        Ok(())
    }

    fn last_closed_at(&self, symbol: &str) -> Result<Option<i64>, String> {
        let sql = last_closed_sql(&self.tables);
        let row = self.run("last_closed_at", |client| client.query_one(&sql, &[&symbol]))?;
        Ok(row.get::<_, Option<i64>>(0))
    }

    fn exists_alerted(&self, symbol: &str, interval: &str, bar_timestamp: i64) -> Result<bool, String> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE symbol = $1 AND interval_key = $2 AND bar_timestamp = $3 LIMIT 1",
            self.tables.alerts
        );
        let row = self.run("exists_alerted", |client| {
            client.query_opt(&sql, &[&symbol, &interval, &bar_timestamp])
        })?;
        Ok(row.is_some())
    }

    fn record_alert(&self, record: &AlertRecord) -> Result<(), String> {
        let sql = format!(
            "INSERT INTO {} (symbol, interval_key, bar_timestamp, message, sent_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (symbol, interval_key, bar_timestamp) DO NOTHING",
            self.tables.alerts
        );
        self.run("record_alert", |client| {
            client.execute(
                &sql,
                &[
                    &record.symbol,
                    &record.interval,
                    &record.bar_timestamp,
                    &record.message,
                    &record.sent_at,
                ],
            )
        })?;
        Ok(())
    }

    fn purge_older_than(&self, cutoff_unixtime: i64) -> Result<u64, String> {
        let alerts_sql = format!("DELETE FROM {} WHERE sent_at < $1", self.tables.alerts);
        let close_sql = format!("DELETE FROM {} WHERE unixtime < $1", self.tables.close_orders);
        let open_sql = format!(
            "DELETE FROM {} WHERE trans_state = '{STATE_OPEN_CLOSE}' AND last_updated_at < $1",
            self.tables.open_orders
        );
        self.run("purge_older_than", |client| {
            let mut tx = client.transaction()?;
            let mut removed = 0u64;
            for sql in [&alerts_sql, &close_sql, &open_sql] {
                removed += tx.execute(sql.as_str(), &[&cutoff_unixtime])?;
            }
            tx.commit()?;
            Ok(removed)
        })
    }
}
