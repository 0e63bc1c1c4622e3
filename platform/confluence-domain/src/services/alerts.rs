use crate::services::lifecycle::LifecycleOutcome;
use crate::services::structure::{StructureShift, STRUCTURE_ALERT_KEY};
use crate::value_objects::order::{CloseOrder, OpenOrder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Open,
    Update,
    Close,
    Structure,
}

impl AlertKind {
    /// The `interval` column of the alert ledger. Order alerts live on the 5m
    /// timeline; each kind gets its own key so an open and a close on the same
    /// bar do not shadow each other.
    pub fn ledger_key(&self) -> &'static str {
        match self {
            AlertKind::Open => "5m:open",
            AlertKind::Update => "5m:update",
            AlertKind::Close => "5m:close",
            AlertKind::Structure => STRUCTURE_ALERT_KEY,
        }
    }
}

/// A message ready for an alert sink, with the ledger coordinates used for dedup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub symbol: String,
    pub bar_timestamp: i64,
    pub message: String,
}

fn clock(hour: u32, minute: u32) -> String {
    format!("{hour}:{minute:02}")
}

pub fn open_message(order: &OpenOrder) -> String {
    format!(
        "Symbol: {} Time: {} Pattern: {} open price: {:.2} stoploss: {:.2} profittarget: {:.2}",
        order.symbol,
        clock(order.hour, order.minute),
        order.direction,
        order.entry_price,
        order.stop_loss,
        order.profit_target
    )
}

pub fn update_message(order: &OpenOrder) -> String {
    format!(
        "Update -- Symbol: {} Time: {}, Pattern: {} trigger price: {:.2} stoploss: {:.2} profittarget: {:.2} engulf: {} fvg: {}",
        order.symbol,
        clock(order.hour, order.minute),
        order.direction,
        order.entry_price,
        order.stop_loss,
        order.profit_target,
        order.secondary_tags.engulfing.as_str(),
        order.secondary_tags.fvg.as_str()
    )
}

pub fn close_message(close: &CloseOrder) -> String {
    format!(
        "Symbol: {} Time: {} Pattern: {}, close price: {:.2}",
        close.symbol,
        clock(close.hour, close.minute),
        close.direction_at_close,
        close.exit_price
    )
}

pub fn structure_message(shift: &StructureShift) -> String {
    format!(
        "Symbol: {} {}: {} Time: {} engulf: {} fvg: {} rsi: {}",
        shift.symbol,
        STRUCTURE_ALERT_KEY,
        shift.direction,
        clock(shift.hour, shift.minute),
        shift.engulfing.as_str(),
        shift.fvg.as_str(),
        shift.rsi_crossover
    )
}

/// The alert an outcome should raise, if any. A fresh order gets the open
/// message; one already tracked past its first bar gets the update message.
pub fn alert_for_outcome(outcome: &LifecycleOutcome) -> Option<Alert> {
    match outcome {
        LifecycleOutcome::Opened { order } | LifecycleOutcome::Refreshed { order } => {
            let (kind, message) = if order.is_fresh() {
                (AlertKind::Open, open_message(order))
            } else {
                (AlertKind::Update, update_message(order))
            };
            Some(Alert {
                kind,
                symbol: order.symbol.clone(),
                bar_timestamp: order.last_updated_at,
                message,
            })
        }
        LifecycleOutcome::Closed { close, .. } => Some(Alert {
            kind: AlertKind::Close,
            symbol: close.symbol.clone(),
            bar_timestamp: close.unixtime,
            message: close_message(close),
        }),
        _ => None,
    }
}

pub fn alert_for_shift(shift: &StructureShift) -> Alert {
    Alert {
        kind: AlertKind::Structure,
        symbol: shift.symbol.clone(),
        bar_timestamp: shift.unixtime,
        message: structure_message(shift),
    }
}
