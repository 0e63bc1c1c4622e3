use crate::value_objects::order::{CloseOrder, OpenOrder};
use serde::{Deserialize, Serialize};

/// One row of the alert ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub symbol: String,
    pub interval: String,
    pub bar_timestamp: i64,
    pub message: String,
    pub sent_at: i64,
}

/// Durable order state and alert ledger. At most one open order exists per
/// symbol.
pub trait OrderStore {
    fn get_open_order(&self, symbol: &str) -> Result<Option<OpenOrder>, String>;

    fn upsert_open_order(&self, order: &OpenOrder) -> Result<(), String>;

    /// Retires the open order so `get_open_order` no longer returns it.
    fn close_open_order(&self, order: &OpenOrder) -> Result<(), String>;

    fn insert_close_order(&self, close: &CloseOrder) -> Result<(), String>;

    /// Newest close timestamp for `symbol`, from close rows or retired orders.
    fn last_closed_at(&self, symbol: &str) -> Result<Option<i64>, String>;

    fn exists_alerted(&self, symbol: &str, interval: &str, bar_timestamp: i64)
        -> Result<bool, String>;

    fn record_alert(&self, record: &AlertRecord) -> Result<(), String>;

    /// Deletes ledger entries and retired orders older than `cutoff_unixtime`.
    /// Returns the number of rows removed.
    fn purge_older_than(&self, cutoff_unixtime: i64) -> Result<u64, String>;
}
