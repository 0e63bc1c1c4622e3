pub mod config;
pub mod evaluation;
pub mod housekeeping;
mod shared;
pub mod structure;
pub mod validation;
