//! Foundational domain types shared by the valuation and formula layers.

pub mod config;
pub mod field;
pub mod market;
pub mod position;
