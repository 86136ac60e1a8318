use crate::core::field::{FieldId, FieldValue};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Identifier of a booked hedge position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PositionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PositionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Direction of the hedge from the portfolio's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// USD bought forward: gains when the market rate rises above the agreed one.
    Bought,
    /// USD sold forward: gains when the market rate falls below the agreed one.
    Sold,
}

impl Side {
    /// Per-USD result of holding `agreed` against a market `rate`.
    pub fn rate_spread(&self, agreed: Decimal, rate: Decimal) -> Decimal {
        match self {
            Side::Sold => agreed - rate,
            Side::Bought => rate - agreed,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bought => write!(f, "BOUGHT"),
            Side::Sold => write!(f, "SOLD"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("position {id}: notional must be positive, got {notional}")]
    NonPositiveNotional { id: PositionId, notional: Decimal },
    #[error("position {id}: agreed rate must be positive, got {rate}")]
    NonPositiveAgreedRate { id: PositionId, rate: Decimal },
    #[error("position {id}: close rate must be positive, got {rate}")]
    NonPositiveCloseRate { id: PositionId, rate: Decimal },
    #[error("position {id}: maturity {maturity} precedes start {start}")]
    MaturityBeforeStart {
        id: PositionId,
        start: NaiveDate,
        maturity: NaiveDate,
    },
}

/// An FX hedge (forward / future) owned by the portfolio.
///
/// Closing a position early sets `close_date` and optionally
/// `close_rate`. The valuation engine only ever reads positions.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::position::{HedgePosition, Side};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
/// let position = HedgePosition::new(
///     "H-1", "DLR/FEB24", Side::Sold, dec!(100_000),
///     date(1, 2), date(2, 25), dec!(1080),
/// )
/// .unwrap()
/// .with_close(date(1, 20), Some(dec!(1060)));
///
/// assert_eq!(position.closing_date(), date(1, 20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgePosition {
    id: PositionId,
    instrument: String,
    side: Side,
    notional_usd: Decimal,
    start_date: NaiveDate,
    maturity_date: NaiveDate,
    agreed_rate: Decimal,
    #[serde(default)]
    close_date: Option<NaiveDate>,
    #[serde(default)]
    close_rate: Option<Decimal>,
    #[serde(default)]
    linked_external_id: Option<String>,
    #[serde(default)]
    custom_field_values: BTreeMap<FieldId, FieldValue>,
}

impl HedgePosition {
    /// Create a validated open position.
    pub fn new(
        id: impl Into<PositionId>,
        instrument: impl Into<String>,
        side: Side,
        notional_usd: Decimal,
        start_date: NaiveDate,
        maturity_date: NaiveDate,
        agreed_rate: Decimal,
    ) -> Result<Self, PositionError> {
        let position = Self {
            id: id.into(),
            instrument: instrument.into(),
            side,
            notional_usd,
            start_date,
            maturity_date,
            agreed_rate,
            close_date: None,
            close_rate: None,
            linked_external_id: None,
            custom_field_values: BTreeMap::new(),
        };
        position.validate()?;
        Ok(position)
    }

    /// Check the booking invariants. Deserialized positions should pass
    /// through here before valuation.
    pub fn validate(&self) -> Result<(), PositionError> {
        if self.notional_usd <= Decimal::ZERO {
            return Err(PositionError::NonPositiveNotional {
                id: self.id.clone(),
                notional: self.notional_usd,
            });
        }
        if self.agreed_rate <= Decimal::ZERO {
            return Err(PositionError::NonPositiveAgreedRate {
                id: self.id.clone(),
                rate: self.agreed_rate,
            });
        }
        if let Some(rate) = self.close_rate {
            if rate <= Decimal::ZERO {
                return Err(PositionError::NonPositiveCloseRate {
                    id: self.id.clone(),
                    rate,
                });
            }
        }
        if self.maturity_date < self.start_date {
            return Err(PositionError::MaturityBeforeStart {
                id: self.id.clone(),
                start: self.start_date,
                maturity: self.maturity_date,
            });
        }
        Ok(())
    }

    /// Record an early close. Without a rate the position is priced off
    /// the curve observed on the close date.
    pub fn with_close(mut self, date: NaiveDate, rate: Option<Decimal>) -> Self {
        self.close_date = Some(date);
        self.close_rate = rate;
        self
    }

    pub fn with_linked_external_id(mut self, external: impl Into<String>) -> Self {
        self.linked_external_id = Some(external.into());
        self
    }

    pub fn with_custom_value(mut self, field: impl Into<FieldId>, value: FieldValue) -> Self {
        self.custom_field_values.insert(field.into(), value);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> &PositionId {
        &self.id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn notional_usd(&self) -> Decimal {
        self.notional_usd
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.maturity_date
    }

    pub fn agreed_rate(&self) -> Decimal {
        self.agreed_rate
    }

    pub fn close_date(&self) -> Option<NaiveDate> {
        self.close_date
    }

    pub fn close_rate(&self) -> Option<Decimal> {
        self.close_rate
    }

    pub fn linked_external_id(&self) -> Option<&str> {
        self.linked_external_id.as_deref()
    }

    pub fn custom_field_values(&self) -> &BTreeMap<FieldId, FieldValue> {
        &self.custom_field_values
    }

    /// The date the position stops being open: explicit close, else maturity.
    pub fn closing_date(&self) -> NaiveDate {
        self.close_date.unwrap_or(self.maturity_date)
    }

    /// P&L in the quote currency for a given market rate.
    pub fn pnl_at(&self, rate: Decimal) -> Decimal {
        self.side.rate_spread(self.agreed_rate, rate) * self.notional_usd
    }
}
