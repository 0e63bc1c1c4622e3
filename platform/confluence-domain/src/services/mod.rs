pub mod alerts;
pub mod indicators;
pub mod lifecycle;
pub mod patterns;
pub mod series;
pub mod signal;
pub mod structure;
