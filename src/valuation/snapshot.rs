//! Portfolio snapshots: the full valuation of a position list on one date.

use crate::core::config::ValuationConfig;
use crate::core::field::{CustomFieldDefinition, FieldId, FieldValue};
use crate::core::market::MarketData;
use crate::core::position::{HedgePosition, PositionId};
use crate::formula::engine::{CustomFieldFormulaEngine, FieldIssue};
use crate::valuation::interpolation::ForwardCurveInterpolator;
use crate::valuation::lifecycle::{partition, LifecycleState};
use crate::valuation::pnl::{PnlEngine, PricedLeg, ValuationGap};
use crate::valuation::resolver::{parse_as_of, IndexedMarket, MarketLookup};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use thiserror::Error;

/// P&L in the quote currency and in the base currency (USD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub quote: Decimal,
    pub base: Decimal,
}

impl Totals {
    pub fn new(quote: Decimal, base: Decimal) -> Self {
        Self { quote, base }
    }

    pub fn is_zero(&self) -> bool {
        self.quote.is_zero() && self.base.is_zero()
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals::new(self.quote + rhs.quote, self.base + rhs.base)
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        self.quote += rhs.quote;
        self.base += rhs.base;
    }
}

impl Sub for Totals {
    type Output = Totals;

    fn sub(self, rhs: Totals) -> Totals {
        Totals::new(self.quote - rhs.quote, self.base - rhs.base)
    }
}

/// A position with its valuation and resolved custom fields, ready for
/// tabular display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedPosition {
    pub position: HedgePosition,
    #[serde(flatten)]
    pub leg: PricedLeg,
    pub custom_fields: BTreeMap<FieldId, FieldValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_issues: BTreeMap<FieldId, FieldIssue>,
}

impl PricedPosition {
    pub fn id(&self) -> &PositionId {
        self.position.id()
    }

    pub fn totals(&self) -> Totals {
        Totals::new(self.leg.pnl_quote, self.leg.pnl_base)
    }

    /// Mark-to-market rate; only latent positions have one.
    pub fn mark_rate(&self) -> Option<Decimal> {
        (self.leg.state == LifecycleState::Latent).then_some(self.leg.valuation_rate)
    }

    /// Rate the position closed at; only realized positions have one.
    pub fn close_rate(&self) -> Option<Decimal> {
        (self.leg.state == LifecycleState::Realized).then_some(self.leg.valuation_rate)
    }
}

/// A position that should have been priced but could not be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpricedPosition {
    pub position_id: PositionId,
    pub state: LifecycleState,
    pub gap: ValuationGap,
}

/// Valuation of the whole portfolio on one date.
///
/// Purely derived from its inputs; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub as_of: Option<NaiveDate>,
    /// Reference spot for the date, zero when the date cannot be valued.
    pub spot_rate_used: Decimal,
    pub realized: Vec<PricedPosition>,
    pub latent: Vec<PricedPosition>,
    pub unpriced: Vec<UnpricedPosition>,
    /// Positions not started yet on `as_of`.
    pub future_count: usize,
    pub realized_totals: Totals,
    pub latent_totals: Totals,
    pub totals: Totals,
}

impl PortfolioSnapshot {
    /// The zero-totals snapshot returned when a date cannot be valued.
    pub fn empty(as_of: Option<NaiveDate>) -> Self {
        Self {
            as_of,
            spot_rate_used: Decimal::ZERO,
            realized: Vec::new(),
            latent: Vec::new(),
            unpriced: Vec::new(),
            future_count: 0,
            realized_totals: Totals::default(),
            latent_totals: Totals::default(),
            totals: Totals::default(),
        }
    }

    /// False for the "cannot value" snapshot.
    pub fn is_valued(&self) -> bool {
        self.spot_rate_used > Decimal::ZERO
    }

    pub fn priced_count(&self) -> usize {
        self.realized.len() + self.latent.len()
    }

    /// Realized then latent positions.
    pub fn priced(&self) -> impl Iterator<Item = &PricedPosition> {
        self.realized.iter().chain(self.latent.iter())
    }
}

impl fmt::Display for PortfolioSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Portfolio Snapshot ===")?;
        match self.as_of {
            Some(date) => writeln!(f, "As of:          {}", date)?,
            None => writeln!(f, "As of:          (invalid date)")?,
        }
        if !self.is_valued() {
            return writeln!(f, "No spot rate available: portfolio cannot be valued.");
        }
        writeln!(f, "Spot:           {}", self.spot_rate_used)?;
        writeln!(f, "Total (quote):  {}", self.totals.quote.round_dp(2))?;
        writeln!(f, "Total (base):   {}", self.totals.base.round_dp(2))?;

        for (label, rows, totals) in [
            ("Realized", &self.realized, self.realized_totals),
            ("Latent", &self.latent, self.latent_totals),
        ] {
            writeln!(f, "\n--- {} ({}) ---", label, rows.len())?;
            for row in rows {
                writeln!(
                    f,
                    "  {:<12} {:<5} {:>14} @ {:>10} -> {:>10}  {:>16}",
                    row.id().as_str(),
                    row.position.side().to_string(),
                    row.position.notional_usd(),
                    row.position.agreed_rate(),
                    row.leg.valuation_rate.round_dp(4),
                    row.leg.pnl_quote.round_dp(2),
                )?;
            }
            writeln!(f, "  Subtotal: {} / {}", totals.quote.round_dp(2), totals.base.round_dp(2))?;
        }

        if !self.unpriced.is_empty() {
            writeln!(f, "\n--- Unpriced ({}) ---", self.unpriced.len())?;
            for row in &self.unpriced {
                writeln!(
                    f,
                    "  {:<12} {:<8} {}",
                    row.position_id.as_str(),
                    row.state.to_string(),
                    row.gap
                )?;
            }
        }
        if self.future_count > 0 {
            writeln!(f, "\nNot yet started: {}", self.future_count)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period start {start} is after end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("period start {0} has no previous day")]
    StartOutOfRange(NaiveDate),
}

/// Result over a period, as the difference of two full revaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodResult {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Snapshot on the day before `start`.
    pub opening: PortfolioSnapshot,
    /// Snapshot on `end`.
    pub closing: PortfolioSnapshot,
    pub realized: Totals,
    pub latent: Totals,
    pub pnl: Totals,
}

impl fmt::Display for PeriodResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Period Result {} .. {} ===", self.start, self.end)?;
        writeln!(f, "Opening total:  {}", self.opening.totals.quote.round_dp(2))?;
        writeln!(f, "Closing total:  {}", self.closing.totals.quote.round_dp(2))?;
        writeln!(f, "Realized:       {}", self.realized.quote.round_dp(2))?;
        writeln!(f, "Latent:         {}", self.latent.quote.round_dp(2))?;
        writeln!(f, "P&L (quote):    {}", self.pnl.quote.round_dp(2))?;
        writeln!(f, "P&L (base):     {}", self.pnl.base.round_dp(2))
    }
}

/// One day of a multi-date valuation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRow {
    pub date: NaiveDate,
    pub valued: bool,
    pub realized: Totals,
    pub latent: Totals,
    pub totals: Totals,
    pub unpriced: usize,
}

/// Values a position list against market data and field definitions.
///
/// Every report goes through here, so the as-of rules are applied the
/// same way everywhere. Stateless across calls: the same inputs always
/// produce the same snapshot.
pub struct PortfolioValuer<'a> {
    positions: &'a [HedgePosition],
    market: &'a MarketData,
    fields: &'a [CustomFieldDefinition],
    interpolator: ForwardCurveInterpolator,
    formulas: CustomFieldFormulaEngine,
}

impl<'a> PortfolioValuer<'a> {
    pub fn new(
        positions: &'a [HedgePosition],
        market: &'a MarketData,
        fields: &'a [CustomFieldDefinition],
    ) -> Self {
        Self::with_config(positions, market, fields, &ValuationConfig::default())
    }

    pub fn with_config(
        positions: &'a [HedgePosition],
        market: &'a MarketData,
        fields: &'a [CustomFieldDefinition],
        config: &ValuationConfig,
    ) -> Self {
        Self {
            positions,
            market,
            fields,
            interpolator: ForwardCurveInterpolator::new(config.day_count_basis),
            formulas: CustomFieldFormulaEngine::new(config.base_metrics.clone()),
        }
    }

    /// Snapshot for `as_of`; `None` stands for an absent or unparseable date.
    pub fn snapshot(&self, as_of: Option<NaiveDate>) -> PortfolioSnapshot {
        self.snapshot_with(self.market, as_of)
    }

    /// Snapshot for a caller-supplied date string.
    pub fn snapshot_str(&self, as_of: &str) -> PortfolioSnapshot {
        self.snapshot(parse_as_of(as_of))
    }

    /// P&L between the close of `start - 1` and the close of `end`.
    pub fn period_pnl(&self, start: NaiveDate, end: NaiveDate) -> Result<PeriodResult, PeriodError> {
        if start > end {
            return Err(PeriodError::InvertedRange { start, end });
        }
        let before = start.pred_opt().ok_or(PeriodError::StartOutOfRange(start))?;
        let opening = self.snapshot(Some(before));
        let closing = self.snapshot(Some(end));
        Ok(PeriodResult {
            start,
            end,
            realized: closing.realized_totals - opening.realized_totals,
            latent: closing.latent_totals - opening.latent_totals,
            pnl: closing.totals - opening.totals,
            opening,
            closing,
        })
    }

    /// Totals for every calendar day in `from..=to`.
    ///
    /// Market series are indexed once; each row equals what
    /// [`snapshot`](Self::snapshot) would report for that day.
    pub fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<LadderRow>, PeriodError> {
        if from > to {
            return Err(PeriodError::InvertedRange { start: from, end: to });
        }
        let indexed = IndexedMarket::new(self.market);
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| {
                let snapshot = self.snapshot_with(&indexed, Some(date));
                LadderRow {
                    date,
                    valued: snapshot.is_valued(),
                    realized: snapshot.realized_totals,
                    latent: snapshot.latent_totals,
                    totals: snapshot.totals,
                    unpriced: snapshot.unpriced.len(),
                }
            })
            .collect())
    }

    fn snapshot_with<M: MarketLookup>(&self, market: &M, as_of: Option<NaiveDate>) -> PortfolioSnapshot {
        let Some(as_of) = as_of else {
            debug!("snapshot requested without a valid as-of date");
            return PortfolioSnapshot::empty(None);
        };
        if self.positions.is_empty() {
            return PortfolioSnapshot::empty(Some(as_of));
        }
        let Some(spot) = market.spot_as_of(as_of).filter(|s| s.rate > Decimal::ZERO) else {
            debug!("no usable spot rate on or before {}; snapshot not valued", as_of);
            return PortfolioSnapshot::empty(Some(as_of));
        };

        let engine = PnlEngine::new(market, self.interpolator);
        let parts = partition(self.positions, as_of);
        let mut snapshot = PortfolioSnapshot::empty(Some(as_of));
        snapshot.spot_rate_used = spot.rate;
        snapshot.future_count = parts.future.len();

        for position in parts.realized {
            match engine.price_realized(position) {
                Ok(leg) => {
                    let priced = self.enrich(position, leg);
                    snapshot.realized_totals += priced.totals();
                    snapshot.realized.push(priced);
                }
                Err(gap) => record_gap(&mut snapshot, position, LifecycleState::Realized, gap),
            }
        }

        match engine.latent_market(as_of) {
            Ok(latent_market) => {
                for position in parts.latent {
                    match engine.price_latent(position, &latent_market) {
                        Ok(leg) => {
                            let priced = self.enrich(position, leg);
                            snapshot.latent_totals += priced.totals();
                            snapshot.latent.push(priced);
                        }
                        Err(gap) => {
                            record_gap(&mut snapshot, position, LifecycleState::Latent, gap)
                        }
                    }
                }
            }
            Err(gap) => {
                for position in parts.latent {
                    record_gap(&mut snapshot, position, LifecycleState::Latent, gap.clone());
                }
            }
        }

        snapshot.totals = snapshot.realized_totals + snapshot.latent_totals;
        snapshot
    }

    fn enrich(&self, position: &HedgePosition, leg: PricedLeg) -> PricedPosition {
        let resolution = self.formulas.resolve(position, self.fields);
        PricedPosition {
            position: position.clone(),
            leg,
            custom_fields: resolution.values,
            field_issues: resolution.issues,
        }
    }
}

fn record_gap(
    snapshot: &mut PortfolioSnapshot,
    position: &HedgePosition,
    state: LifecycleState,
    gap: ValuationGap,
) {
    debug!("position {} ({}) not priced: {}", position.id(), state, gap);
    snapshot.unpriced.push(UnpricedPosition {
        position_id: position.id().clone(),
        state,
        gap,
    });
}

/// Value `positions` on `as_of` with default settings.
pub fn snapshot(
    as_of: Option<NaiveDate>,
    positions: &[HedgePosition],
    market: &MarketData,
    fields: &[CustomFieldDefinition],
) -> PortfolioSnapshot {
    PortfolioValuer::new(positions, market, fields).snapshot(as_of)
}
