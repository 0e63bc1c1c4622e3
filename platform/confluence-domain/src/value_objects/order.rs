use crate::value_objects::direction::Direction;
use crate::value_objects::pattern::SecondaryTags;
use serde::{Deserialize, Serialize};

/// The single tracked opportunity for a symbol. Identity is `(symbol, created_at)`;
/// `entry_price` and `created_at` never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub profit_target: f64,
    pub created_at: i64,
    pub last_updated_at: i64,
    pub hour: u32,
    pub minute: u32,
    pub secondary_tags: SecondaryTags,
}

impl OpenOrder {
    /// A freshly created order has not been refreshed by a later bar yet.
    pub fn is_fresh(&self) -> bool {
        self.last_updated_at == self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub symbol: String,
    pub direction_at_close: Direction,
    pub exit_price: f64,
    pub stop_loss: f64,
    pub profit_target: f64,
    pub unixtime: i64,
    pub hour: u32,
    pub minute: u32,
}
