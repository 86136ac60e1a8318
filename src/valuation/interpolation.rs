//! Forward rate interpolation for maturities the curve does not quote.
//!
//! Rates are blended in annualized implied-rate (TNA) space rather than
//! in raw FX price space. The curve's own observation date, priced at the
//! anchor spot, acts as day zero.

use crate::core::market::{CurvePoint, ForwardCurveSnapshot};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("anchor spot rate must be positive, got {0}")]
    NonPositiveAnchor(Decimal),
    #[error("curve observed on {observed_on} has no points")]
    EmptyCurve { observed_on: NaiveDate },
    #[error("{maturity} is beyond the curve horizon {horizon}")]
    BeyondHorizon {
        maturity: NaiveDate,
        horizon: NaiveDate,
    },
    #[error("{maturity} is not after the curve observation date {observed_on}")]
    NonPositiveDayCount {
        maturity: NaiveDate,
        observed_on: NaiveDate,
    },
}

/// A rate read off a forward curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveRate {
    pub rate: Decimal,
    /// True when the maturity is quoted literally on the curve.
    pub exact: bool,
}

/// Annualized simple rate implied by a forward `rate` against `spot`
/// over `days`, in percent.
pub fn implied_tna(rate: Decimal, spot: Decimal, days: i64, basis: Decimal) -> Decimal {
    (rate / spot - Decimal::ONE) / Decimal::from(days) * basis * Decimal::ONE_HUNDRED
}

/// Forward price implied by an annualized simple rate (percent).
pub fn rate_from_tna(tna: Decimal, spot: Decimal, days: i64, basis: Decimal) -> Decimal {
    spot * (Decimal::ONE + tna / Decimal::ONE_HUNDRED * Decimal::from(days) / basis)
}

/// Bracket-and-blend interpolator.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::market::{CurvePoint, ForwardCurveSnapshot};
/// use hedge_mtm_engine::valuation::interpolation::ForwardCurveInterpolator;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
/// let curve = ForwardCurveSnapshot::new(
///     date(1, 10),
///     vec![
///         CurvePoint::new(date(2, 10), dec!(1050)),
///         CurvePoint::new(date(3, 10), dec!(1100)),
///     ],
/// );
/// let interp = ForwardCurveInterpolator::default();
///
/// let mark = interp.interpolate(date(2, 25), &curve, dec!(1000)).unwrap();
/// assert!(mark > dec!(1050) && mark < dec!(1100));
/// assert!(interp.interpolate(date(4, 1), &curve, dec!(1000)).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardCurveInterpolator {
    basis: Decimal,
}

impl Default for ForwardCurveInterpolator {
    fn default() -> Self {
        Self::new(365)
    }
}

impl ForwardCurveInterpolator {
    /// Interpolator annualizing over `day_count_basis` days.
    pub fn new(day_count_basis: u32) -> Self {
        Self {
            basis: Decimal::from(day_count_basis.max(1)),
        }
    }

    /// Rate for `target` on `curve`, or `None` when it cannot be derived.
    pub fn interpolate(
        &self,
        target: NaiveDate,
        curve: &ForwardCurveSnapshot,
        anchor_spot: Decimal,
    ) -> Option<Decimal> {
        self.try_interpolate(target, curve, anchor_spot)
            .ok()
            .map(|r| r.rate)
    }

    /// Same as [`interpolate`](Self::interpolate) but explains failures.
    ///
    /// # Algorithm
    ///
    /// 1. An exact maturity match returns the quoted rate.
    /// 2. Otherwise bracket `target` between the nearest quoted maturities.
    ///    Before the first point the lower bracket is the anchor (curve
    ///    date at spot) whose TNA is taken flat from the first point.
    ///    Past the last point there is no extrapolation. A target on the
    ///    observation date itself is the anchor spot.
    /// 3. Blend the brackets' TNAs linearly by day count and convert back
    ///    to a price at `target`'s day count.
    pub fn try_interpolate(
        &self,
        target: NaiveDate,
        curve: &ForwardCurveSnapshot,
        anchor_spot: Decimal,
    ) -> Result<CurveRate, InterpolationError> {
        if anchor_spot <= Decimal::ZERO {
            return Err(InterpolationError::NonPositiveAnchor(anchor_spot));
        }
        let points = curve.sorted_points();
        let horizon = match points.last() {
            Some(last) => last.maturity,
            None => {
                return Err(InterpolationError::EmptyCurve {
                    observed_on: curve.observed_on,
                })
            }
        };

        if let Some(point) = points.iter().find(|p| p.maturity == target) {
            return Ok(CurveRate {
                rate: point.rate,
                exact: true,
            });
        }

        let upper_idx = points
            .iter()
            .position(|p| p.maturity > target)
            .ok_or(InterpolationError::BeyondHorizon {
                maturity: target,
                horizon,
            })?;

        // Day zero of the curve settles at the anchor itself.
        let target_days = (target - curve.observed_on).num_days();
        if target_days == 0 {
            return Ok(CurveRate {
                rate: anchor_spot,
                exact: false,
            });
        }
        let target_days = self.days_from_anchor(curve, target)?;
        let upper = points[upper_idx];
        let upper_days = self.days_from_anchor(curve, upper.maturity)?;
        let upper_tna = implied_tna(upper.rate, anchor_spot, upper_days, self.basis);

        let (lower_days, lower_tna) = match upper_idx.checked_sub(1).map(|i| points[i]) {
            Some(lower) => self.bracket(curve, lower, anchor_spot)?,
            None => (0, upper_tna),
        };

        let weight =
            Decimal::from(target_days - lower_days) / Decimal::from(upper_days - lower_days);
        let tna = lower_tna + (upper_tna - lower_tna) * weight;

        Ok(CurveRate {
            rate: rate_from_tna(tna, anchor_spot, target_days, self.basis),
            exact: false,
        })
    }

    fn bracket(
        &self,
        curve: &ForwardCurveSnapshot,
        point: &CurvePoint,
        anchor_spot: Decimal,
    ) -> Result<(i64, Decimal), InterpolationError> {
        let days = self.days_from_anchor(curve, point.maturity)?;
        Ok((days, implied_tna(point.rate, anchor_spot, days, self.basis)))
    }

    fn days_from_anchor(
        &self,
        curve: &ForwardCurveSnapshot,
        maturity: NaiveDate,
    ) -> Result<i64, InterpolationError> {
        let days = (maturity - curve.observed_on).num_days();
        if days <= 0 {
            return Err(InterpolationError::NonPositiveDayCount {
                maturity,
                observed_on: curve.observed_on,
            });
        }
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn curve() -> ForwardCurveSnapshot {
        ForwardCurveSnapshot::new(
            date(1, 10),
            vec![
                CurvePoint::new(date(3, 10), dec!(1100)),
                CurvePoint::new(date(2, 10), dec!(1050)),
            ],
        )
    }

    #[test]
    fn test_exact_point() {
        let interp = ForwardCurveInterpolator::default();
        let r = interp
            .try_interpolate(date(3, 10), &curve(), dec!(1000))
            .unwrap();
        assert_eq!(r.rate, dec!(1100));
        assert!(r.exact);
    }

    #[test]
    fn test_between_points() {
        let interp = ForwardCurveInterpolator::default();
        let rate = interp.interpolate(date(2, 25), &curve(), dec!(1000)).unwrap();
        assert!(rate > dec!(1050) && rate < dec!(1100));

        // 46 days out, TNA blended 15/29 of the way from 31d to 60d.
        let tna_lo = implied_tna(dec!(1050), dec!(1000), 31, dec!(365));
        let tna_hi = implied_tna(dec!(1100), dec!(1000), 60, dec!(365));
        let tna = tna_lo + (tna_hi - tna_lo) * dec!(15) / dec!(29);
        let expected = rate_from_tna(tna, dec!(1000), 46, dec!(365));
        assert!((rate - expected).abs() < dec!(0.000001));
    }

    #[test]
    fn test_before_first_point_uses_anchor() {
        let interp = ForwardCurveInterpolator::default();
        let rate = interp.interpolate(date(1, 25), &curve(), dec!(1000)).unwrap();
        // Flat TNA from the first point: linear in price from spot.
        let expected = dec!(1000) + dec!(50) * dec!(15) / dec!(31);
        assert!((rate - expected).abs() < dec!(0.000001));
        assert!(rate > dec!(1000) && rate < dec!(1050));
    }

    #[test]
    fn test_beyond_horizon() {
        let interp = ForwardCurveInterpolator::default();
        assert_eq!(
            interp.try_interpolate(date(3, 11), &curve(), dec!(1000)),
            Err(InterpolationError::BeyondHorizon {
                maturity: date(3, 11),
                horizon: date(3, 10),
            })
        );
    }

    #[test]
    fn test_guards() {
        let interp = ForwardCurveInterpolator::default();
        assert!(matches!(
            interp.try_interpolate(date(2, 25), &curve(), Decimal::ZERO),
            Err(InterpolationError::NonPositiveAnchor(_))
        ));
        assert!(matches!(
            interp.try_interpolate(date(1, 9), &curve(), dec!(1000)),
            Err(InterpolationError::NonPositiveDayCount { .. })
        ));
        let empty = ForwardCurveSnapshot::new(date(1, 10), Vec::new());
        assert!(matches!(
            interp.try_interpolate(date(2, 1), &empty, dec!(1000)),
            Err(InterpolationError::EmptyCurve { .. })
        ));
    }

    #[test]
    fn test_observation_date_prices_at_anchor() {
        let interp = ForwardCurveInterpolator::default();
        assert_eq!(
            interp.interpolate(date(1, 10), &curve(), dec!(1003)),
            Some(dec!(1003))
        );
    }

    #[test]
    fn test_stale_lower_point_rejected() {
        let stale = ForwardCurveSnapshot::new(
            date(1, 10),
            vec![
                CurvePoint::new(date(1, 5), dec!(1001)),
                CurvePoint::new(date(2, 10), dec!(1050)),
            ],
        );
        let interp = ForwardCurveInterpolator::default();
        assert!(interp.interpolate(date(1, 20), &stale, dec!(1000)).is_none());
    }

    #[test]
    fn test_tna_round_trip() {
        let tna = implied_tna(dec!(1050), dec!(1000), 73, dec!(365));
        assert!((tna - dec!(25)).abs() < dec!(0.0000000001));
        let rate = rate_from_tna(tna, dec!(1000), 73, dec!(365));
        assert!((rate - dec!(1050)).abs() < dec!(0.0000000001));
    }
}
