//! Per-position profit and loss in quote and base currency.

use crate::core::market::ForwardCurveSnapshot;
use crate::core::position::HedgePosition;
use crate::valuation::interpolation::{ForwardCurveInterpolator, InterpolationError};
use crate::valuation::lifecycle::LifecycleState;
use crate::valuation::resolver::MarketLookup;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a position could not be priced on a given date.
///
/// Gaps exclude the position from totals; they never fail a snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValuationGap {
    #[error("no spot rate observed on or before {date}")]
    NoSpotRate { date: NaiveDate },
    #[error("no forward curve observed on or before {date}")]
    NoForwardCurve { date: NaiveDate },
    #[error("spot rate {rate} observed on {observed_on} is not positive")]
    NonPositiveSpot { observed_on: NaiveDate, rate: Decimal },
    #[error("forward rate unavailable: {reason}")]
    Interpolation { reason: String },
}

impl From<InterpolationError> for ValuationGap {
    fn from(err: InterpolationError) -> Self {
        ValuationGap::Interpolation {
            reason: err.to_string(),
        }
    }
}

/// Where the rate a position was valued at came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// The close rate recorded on the position.
    ExplicitClose,
    /// A maturity quoted literally on the curve.
    CurvePoint,
    /// Derived between curve points.
    Interpolated,
}

/// The priced result for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLeg {
    pub state: LifecycleState,
    /// Close rate for realized positions, mark rate for latent ones.
    pub valuation_rate: Decimal,
    pub rate_source: RateSource,
    /// Spot used to convert quote-currency P&L into base currency.
    pub spot_rate: Decimal,
    /// Observation date of the curve used, if any.
    pub curve_observed_on: Option<NaiveDate>,
    pub pnl_quote: Decimal,
    pub pnl_base: Decimal,
}

/// The spot and curve every latent position on one date is marked against.
#[derive(Debug, Clone, Copy)]
pub struct LatentMarket<'a> {
    pub as_of: NaiveDate,
    pub spot: Decimal,
    pub curve: &'a ForwardCurveSnapshot,
}

/// Prices realized and latent positions against a market.
pub struct PnlEngine<'m, M: MarketLookup> {
    market: &'m M,
    interpolator: ForwardCurveInterpolator,
}

impl<'m, M: MarketLookup> PnlEngine<'m, M> {
    pub fn new(market: &'m M, interpolator: ForwardCurveInterpolator) -> Self {
        Self {
            market,
            interpolator,
        }
    }

    /// Price a position that closed or matured on or before the valuation date.
    ///
    /// # Algorithm
    ///
    /// 1. Closing date = explicit close date, else maturity.
    /// 2. Spot as of the closing date converts to base currency.
    /// 3. Close rate = the recorded one, else the original maturity priced
    ///    off the curve as seen on the closing date.
    pub fn price_realized(&self, position: &HedgePosition) -> Result<PricedLeg, ValuationGap> {
        let closing = position.closing_date();
        let spot = self.spot_as_of(closing)?;

        let (rate, source, curve_date) = match position.close_rate() {
            Some(rate) => (rate, RateSource::ExplicitClose, None),
            None => {
                let curve = self
                    .market
                    .curve_as_of(closing)
                    .ok_or(ValuationGap::NoForwardCurve { date: closing })?;
                let quote =
                    self.interpolator
                        .try_interpolate(position.maturity_date(), curve, spot)?;
                (quote.rate, curve_source(quote.exact), Some(curve.observed_on))
            }
        };

        Ok(leg(LifecycleState::Realized, position, rate, source, spot, curve_date))
    }

    /// Resolve the spot and curve latent positions are marked against.
    ///
    /// Both are required: without either, no latent position is valued.
    pub fn latent_market(&self, as_of: NaiveDate) -> Result<LatentMarket<'m>, ValuationGap> {
        let spot = self.spot_as_of(as_of)?;
        let curve = self
            .market
            .curve_as_of(as_of)
            .ok_or(ValuationGap::NoForwardCurve { date: as_of })?;
        Ok(LatentMarket { as_of, spot, curve })
    }

    /// Usable spot on or before `date`; base conversion divides by it.
    fn spot_as_of(&self, date: NaiveDate) -> Result<Decimal, ValuationGap> {
        let spot = self
            .market
            .spot_as_of(date)
            .ok_or(ValuationGap::NoSpotRate { date })?;
        if spot.rate <= Decimal::ZERO {
            return Err(ValuationGap::NonPositiveSpot {
                observed_on: spot.date,
                rate: spot.rate,
            });
        }
        Ok(spot.rate)
    }

    /// Mark an open position to its maturity on the as-of curve.
    pub fn price_latent(
        &self,
        position: &HedgePosition,
        market: &LatentMarket<'_>,
    ) -> Result<PricedLeg, ValuationGap> {
        let quote = self.interpolator.try_interpolate(
            position.maturity_date(),
            market.curve,
            market.spot,
        )?;
        Ok(leg(
            LifecycleState::Latent,
            position,
            quote.rate,
            curve_source(quote.exact),
            market.spot,
            Some(market.curve.observed_on),
        ))
    }
}

fn curve_source(exact: bool) -> RateSource {
    if exact {
        RateSource::CurvePoint
    } else {
        RateSource::Interpolated
    }
}

fn leg(
    state: LifecycleState,
    position: &HedgePosition,
    rate: Decimal,
    rate_source: RateSource,
    spot: Decimal,
    curve_observed_on: Option<NaiveDate>,
) -> PricedLeg {
    let pnl_quote = position.pnl_at(rate);
    PricedLeg {
        state,
        valuation_rate: rate,
        rate_source,
        spot_rate: spot,
        curve_observed_on,
        pnl_quote,
        pnl_base: pnl_quote / spot,
    }
}
