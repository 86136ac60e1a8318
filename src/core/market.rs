use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A spot FX rate observed on a single calendar date.
///
/// Quoted as units of the quote currency per one USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotRateObservation {
    pub date: NaiveDate,
    pub rate: Decimal,
}

impl SpotRateObservation {
    pub fn new(date: NaiveDate, rate: Decimal) -> Self {
        Self { date, rate }
    }
}

/// One settlement date on a forward curve and the rate quoted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub maturity: NaiveDate,
    pub rate: Decimal,
}

impl CurvePoint {
    pub fn new(maturity: NaiveDate, rate: Decimal) -> Self {
        Self { maturity, rate }
    }
}

/// The full forward curve as it was seen on `observed_on`.
///
/// Snapshots accumulate over time, one per day rates were recorded.
/// Points are not required to be sorted.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::market::{CurvePoint, ForwardCurveSnapshot};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
/// let curve = ForwardCurveSnapshot::new(
///     day(10),
///     vec![CurvePoint::new(day(31), dec!(1050))],
/// );
/// assert_eq!(curve.horizon(), Some(day(31)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardCurveSnapshot {
    pub observed_on: NaiveDate,
    pub points: Vec<CurvePoint>,
}

impl ForwardCurveSnapshot {
    pub fn new(observed_on: NaiveDate, points: Vec<CurvePoint>) -> Self {
        Self {
            observed_on,
            points,
        }
    }

    /// Points ordered by ascending maturity.
    pub fn sorted_points(&self) -> Vec<&CurvePoint> {
        let mut points: Vec<&CurvePoint> = self.points.iter().collect();
        points.sort_by_key(|p| p.maturity);
        points
    }

    /// The last maturity quoted on this curve.
    pub fn horizon(&self) -> Option<NaiveDate> {
        self.points.iter().map(|p| p.maturity).max()
    }

    /// Check the snapshot invariants: positive rates, unique maturities.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let mut seen = HashSet::new();
        for point in &self.points {
            if point.rate <= Decimal::ZERO {
                return Err(MarketDataError::NonPositiveCurveRate {
                    observed_on: self.observed_on,
                    maturity: point.maturity,
                    rate: point.rate,
                });
            }
            if !seen.insert(point.maturity) {
                return Err(MarketDataError::DuplicateMaturity {
                    observed_on: self.observed_on,
                    maturity: point.maturity,
                });
            }
        }
        Ok(())
    }
}

/// Errors raised when validating market data at the import boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("spot rate must be positive, got {rate} on {date}")]
    NonPositiveSpot { date: NaiveDate, rate: Decimal },
    #[error("more than one spot observation on {date}")]
    DuplicateSpotDate { date: NaiveDate },
    #[error("curve observed on {observed_on} quotes non-positive rate {rate} for {maturity}")]
    NonPositiveCurveRate {
        observed_on: NaiveDate,
        maturity: NaiveDate,
        rate: Decimal,
    },
    #[error("curve observed on {observed_on} quotes {maturity} more than once")]
    DuplicateMaturity {
        observed_on: NaiveDate,
        maturity: NaiveDate,
    },
}

/// The two append-only market series the engine values against.
///
/// Every way in (constructor, deserialization, appends) is validated, so
/// the engine never sees a non-positive rate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawMarketData")]
pub struct MarketData {
    spot_rates: Vec<SpotRateObservation>,
    forward_curves: Vec<ForwardCurveSnapshot>,
}

/// Unvalidated wire form of [`MarketData`].
#[derive(Deserialize)]
struct RawMarketData {
    #[serde(default)]
    spot_rates: Vec<SpotRateObservation>,
    #[serde(default)]
    forward_curves: Vec<ForwardCurveSnapshot>,
}

impl TryFrom<RawMarketData> for MarketData {
    type Error = MarketDataError;

    fn try_from(raw: RawMarketData) -> Result<Self, Self::Error> {
        MarketData::new(raw.spot_rates, raw.forward_curves)
    }
}

impl MarketData {
    /// Build validated market data.
    pub fn new(
        spot_rates: Vec<SpotRateObservation>,
        forward_curves: Vec<ForwardCurveSnapshot>,
    ) -> Result<Self, MarketDataError> {
        let data = Self {
            spot_rates,
            forward_curves,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), MarketDataError> {
        let mut dates = HashSet::new();
        for obs in &self.spot_rates {
            check_spot(obs)?;
            if !dates.insert(obs.date) {
                return Err(MarketDataError::DuplicateSpotDate { date: obs.date });
            }
        }
        for curve in &self.forward_curves {
            curve.validate()?;
        }
        Ok(())
    }

    pub fn spot_rates(&self) -> &[SpotRateObservation] {
        &self.spot_rates
    }

    pub fn forward_curves(&self) -> &[ForwardCurveSnapshot] {
        &self.forward_curves
    }

    /// Append a spot observation. Series order is irrelevant to resolution.
    pub fn push_spot(&mut self, observation: SpotRateObservation) -> Result<(), MarketDataError> {
        check_spot(&observation)?;
        if self.spot_rates.iter().any(|o| o.date == observation.date) {
            return Err(MarketDataError::DuplicateSpotDate {
                date: observation.date,
            });
        }
        self.spot_rates.push(observation);
        Ok(())
    }

    pub fn push_curve(&mut self, curve: ForwardCurveSnapshot) -> Result<(), MarketDataError> {
        curve.validate()?;
        self.forward_curves.push(curve);
        Ok(())
    }
}

fn check_spot(obs: &SpotRateObservation) -> Result<(), MarketDataError> {
    if obs.rate <= Decimal::ZERO {
        return Err(MarketDataError::NonPositiveSpot {
            date: obs.date,
            rate: obs.rate,
        });
    }
    Ok(())
}
