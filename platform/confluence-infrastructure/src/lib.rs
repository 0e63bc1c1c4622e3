pub mod alerts;
pub mod market_data;
pub mod persistence;
