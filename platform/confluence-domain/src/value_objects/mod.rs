pub mod bar;
pub mod direction;
pub mod interval;
pub mod order;
pub mod pattern;
