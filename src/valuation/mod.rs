//! Point-in-time mark-to-market valuation.

pub mod interpolation;
pub mod lifecycle;
pub mod pnl;
pub mod resolver;
pub mod snapshot;
