//! Random portfolio generation for benchmarks, demos and the CLI.
//!
//! Output is fully determined by the seed.

use crate::core::market::{CurvePoint, ForwardCurveSnapshot, MarketData, SpotRateObservation};
use crate::core::position::{HedgePosition, Side};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for generating a random hedge portfolio.
#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    pub position_count: usize,
    /// Length of the market history, in calendar days.
    pub days: u32,
    pub start_date: NaiveDate,
    pub seed: u64,
    pub base_spot: Decimal,
    /// Annualized implied rate (percent) the curves are built around.
    pub annual_rate: Decimal,
    /// Curve tenors in days from the observation date.
    pub tenors: Vec<i64>,
    /// Share of positions closed before maturity.
    pub close_ratio: f64,
    pub min_notional: u64,
    pub max_notional: u64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            position_count: 50,
            days: 90,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or(NaiveDate::MIN),
            seed: 42,
            base_spot: dec!(800),
            annual_rate: dec!(60),
            tenors: vec![30, 60, 90, 120, 180],
            close_ratio: 0.3,
            min_notional: 10,
            max_notional: 1_000,
        }
    }
}

/// Market history and positions produced by [`generate_portfolio`].
#[derive(Debug, Clone)]
pub struct GeneratedPortfolio {
    pub market: MarketData,
    pub positions: Vec<HedgePosition>,
}

/// Generate a random portfolio: a daily spot path, one curve per day and
/// a mix of open, matured and early-closed positions.
pub fn generate_portfolio(config: &PortfolioConfig) -> GeneratedPortfolio {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut tenors: Vec<i64> = config.tenors.iter().copied().filter(|t| *t > 0).collect();
    tenors.sort_unstable();
    tenors.dedup();
    if tenors.is_empty() {
        tenors.push(30);
    }

    let mut spots = Vec::with_capacity(config.days as usize);
    let mut curves = Vec::with_capacity(config.days as usize);
    let mut spot = config.base_spot;
    for offset in 0..config.days {
        let date = config.start_date + Duration::days(offset as i64);
        let drift = Decimal::from_f64_retain(rng.gen_range(-0.004..0.008)).unwrap_or_default();
        spot = (spot * (Decimal::ONE + drift)).round_dp(4);
        spots.push(SpotRateObservation::new(date, spot));

        let points = tenors
            .iter()
            .map(|&tenor| {
                let noise = Decimal::from(rng.gen_range(-300i64..300)) / dec!(100);
                let tna = config.annual_rate + noise;
                CurvePoint::new(date + Duration::days(tenor), forward(spot, tna, tenor))
            })
            .collect();
        curves.push(ForwardCurveSnapshot::new(date, points));
    }

    let max_tenor = tenors.iter().copied().max().unwrap_or(30);
    let mut positions = Vec::with_capacity(config.position_count);
    for i in 0..config.position_count {
        let start_offset = rng.gen_range(0..config.days.max(1)) as usize;
        let start = config.start_date + Duration::days(start_offset as i64);
        let tenor = rng.gen_range(7.min(max_tenor)..=max_tenor);
        let maturity = start + Duration::days(tenor);
        let start_spot = spots.get(start_offset).map(|s| s.rate).unwrap_or(config.base_spot);
        let spread = Decimal::from(rng.gen_range(-500i64..500)) / dec!(100);
        let agreed = forward(start_spot, config.annual_rate + spread, tenor).round_dp(2);
        let side = if rng.gen_bool(0.5) { Side::Sold } else { Side::Bought };
        let units = rng.gen_range(config.min_notional..=config.max_notional.max(config.min_notional));
        let notional = Decimal::from(units * 1_000);
        let external = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();

        let Ok(mut position) = HedgePosition::new(
            format!("H-{:04}", i),
            format!("DLR/{}", maturity.format("%b%y").to_string().to_uppercase()),
            side,
            notional,
            start,
            maturity,
            agreed,
        ) else {
            continue;
        };
        position = position.with_linked_external_id(external.to_string());

        if rng.gen_bool(config.close_ratio.clamp(0.0, 1.0)) {
            let close = start + Duration::days(rng.gen_range(1..tenor.max(2)));
            let rate = if rng.gen_bool(0.5) {
                let close_offset = (close - config.start_date).num_days() as usize;
                spots.get(close_offset).map(|s| s.rate)
            } else {
                None
            };
            position = position.with_close(close, rate);
        }
        positions.push(position);
    }

    GeneratedPortfolio {
        market: MarketData::new(spots, curves).unwrap_or_default(),
        positions,
    }
}

fn forward(spot: Decimal, tna: Decimal, days: i64) -> Decimal {
    (spot * (Decimal::ONE + tna / dec!(100) * Decimal::from(days) / dec!(365))).round_dp(4)
}
