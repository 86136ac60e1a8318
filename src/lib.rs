//! # hedge-mtm-engine
//!
//! Point-in-time mark-to-market valuation for FX hedge portfolios.
//!
//! Given spot and forward-curve time series plus a list of hedge
//! positions, the engine reconstructs for any date which positions are
//! realized and which are still open, prices each in quote and base
//! currency, and aggregates the results into portfolio totals.
//!
//! ## Architecture
//!
//! - **core**: Market data, hedge positions, custom fields, configuration
//! - **valuation**: As-of resolution, curve interpolation, lifecycle
//!   classification, P&L and portfolio snapshots
//! - **formula**: Calculated custom fields with dependency ordering
//! - **simulation**: Seeded random portfolios for benchmarks and demos

pub mod core;
pub mod formula;
pub mod simulation;
pub mod valuation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::config::ValuationConfig;
    pub use crate::core::field::{CustomFieldDefinition, FieldDataType, FieldId, FieldValue};
    pub use crate::core::market::{CurvePoint, ForwardCurveSnapshot, MarketData, SpotRateObservation};
    pub use crate::core::position::{HedgePosition, PositionId, Side};
    pub use crate::formula::engine::CustomFieldFormulaEngine;
    pub use crate::valuation::interpolation::ForwardCurveInterpolator;
    pub use crate::valuation::lifecycle::LifecycleState;
    pub use crate::valuation::snapshot::{PeriodResult, PortfolioSnapshot, PortfolioValuer, Totals};
}
