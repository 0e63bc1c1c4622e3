use confluence_domain::repositories::orders::{AlertRecord, OrderStore};
use confluence_domain::value_objects::order::{CloseOrder, OpenOrder};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderState {
    Open,
    OpenClose,
}

#[derive(Debug, Default)]
struct MemoryState {
    orders: Vec<(OpenOrder, OrderState)>,
    closes: Vec<CloseOrder>,
    alerts: Vec<AlertRecord>,
}

/// Process-local store for dry runs and tests. Mirrors the Postgres store's
/// semantics: one open row per symbol, retired rows kept until purged.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    state: Mutex<MemoryState>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_orders(&self) -> Vec<OpenOrder> {
        self.orders_in(OrderState::Open)
    }

    pub fn retired_orders(&self) -> Vec<OpenOrder> {
        self.orders_in(OrderState::OpenClose)
    }

    pub fn close_orders(&self) -> Vec<CloseOrder> {
        self.state.lock().closes.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.state.lock().alerts.clone()
    }

    fn orders_in(&self, wanted: OrderState) -> Vec<OpenOrder> {
        self.state
            .lock()
            .orders
            .iter()
            .filter(|(_, state)| *state == wanted)
            .map(|(order, _)| order.clone())
            .collect()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn get_open_order(&self, symbol: &str) -> Result<Option<OpenOrder>, String> {
        Ok(self
            .state
            .lock()
            .orders
            .iter()
            .find(|(order, state)| *state == OrderState::Open && order.symbol == symbol)
            .map(|(order, _)| order.clone()))
    }

    fn upsert_open_order(&self, order: &OpenOrder) -> Result<(), String> {
        let mut state = self.state.lock();
        let existing = state.orders.iter_mut().find(|(stored, s)| {
            *s == OrderState::Open && stored.symbol == order.symbol
        });
        match existing {
            Some((stored, _)) if stored.created_at == order.created_at => {
                *stored = order.clone();
                Ok(())
            }
            Some((stored, _)) => Err(format!(
                "symbol {} already has an open order created at {}",
                stored.symbol, stored.created_at
            )),
            None => {
                state.orders.push((order.clone(), OrderState::Open));
                Ok(())
            }
        }
    }

    fn close_open_order(&self, order: &OpenOrder) -> Result<(), String> {
        let mut state = self.state.lock();
        let target = state.orders.iter_mut().find(|(stored, s)| {
            *s == OrderState::Open
                && stored.symbol == order.symbol
                && stored.created_at == order.created_at
        });
        if let Some((_, s)) = target {
            *s = OrderState::OpenClose;
        } else {
            state.orders.push((order.clone(), OrderState::OpenClose));
        }
        Ok(())
    }

    fn insert_close_order(&self, close: &CloseOrder) -> Result<(), String> {
        let mut state = self.state.lock();
        let duplicate = state
            .closes
            .iter()
            .any(|c| c.symbol == close.symbol && c.unixtime == close.unixtime);
        if !duplicate {
            state.closes.push(close.clone());
        }
        Ok(())
    }

    fn last_closed_at(&self, symbol: &str) -> Result<Option<i64>, String> {
        let state = self.state.lock();
        let closes = state
            .closes
            .iter()
            .filter(|c| c.symbol == symbol)
            .map(|c| c.unixtime);
        let retired = state
            .orders
            .iter()
            .filter(|(order, s)| *s == OrderState::OpenClose && order.symbol == symbol)
            .map(|(order, _)| order.last_updated_at);
        Ok(closes.chain(retired).max())
    }

    fn exists_alerted(&self, symbol: &str, interval: &str, bar_timestamp: i64) -> Result<bool, String> {
        Ok(self.state.lock().alerts.iter().any(|a| {
            a.symbol == symbol && a.interval == interval && a.bar_timestamp == bar_timestamp
        }))
    }

    fn record_alert(&self, record: &AlertRecord) -> Result<(), String> {
        let mut state = self.state.lock();
        let duplicate = state.alerts.iter().any(|a| {
            a.symbol == record.symbol
                && a.interval == record.interval
                && a.bar_timestamp == record.bar_timestamp
        });
        if !duplicate {
            state.alerts.push(record.clone());
        }
        Ok(())
    }

    fn purge_older_than(&self, cutoff_unixtime: i64) -> Result<u64, String> {
        let mut state = self.state.lock();
        let before = state.alerts.len() + state.closes.len() + state.orders.len();
        state.alerts.retain(|a| a.sent_at >= cutoff_unixtime);
        state.closes.retain(|c| c.unixtime >= cutoff_unixtime);
        state.orders.retain(|(order, s)| {
            *s == OrderState::Open || order.last_updated_at >= cutoff_unixtime
        });
        let after = state.alerts.len() + state.closes.len() + state.orders.len();
        Ok((before - after) as u64)
    }
}
