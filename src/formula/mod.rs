//! Calculated custom fields.

pub mod dependency;
pub mod engine;
pub mod expression;
