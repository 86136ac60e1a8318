use chrono::{Duration, NaiveDate};
use hedge_mtm_engine::core::field::{CustomFieldDefinition, FieldId, FieldValue};
use hedge_mtm_engine::core::market::{
    CurvePoint, ForwardCurveSnapshot, MarketData, SpotRateObservation,
};
use hedge_mtm_engine::core::position::{HedgePosition, Side};
use hedge_mtm_engine::formula::engine::CustomFieldFormulaEngine;
use hedge_mtm_engine::valuation::interpolation::ForwardCurveInterpolator;
use hedge_mtm_engine::valuation::resolver::{resolve_as_of, SeriesIndex};
use hedge_mtm_engine::valuation::snapshot::PortfolioValuer;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

/// A positive rate between 500.00 and 1500.00.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (50_000i64..150_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// A curve observed on `day(observed)` with 1..6 distinct maturities after it.
fn arb_curve(observed: i64) -> impl Strategy<Value = ForwardCurveSnapshot> {
    prop::collection::btree_map(1i64..200, arb_rate(), 1..6).prop_map(move |points| {
        ForwardCurveSnapshot::new(
            day(observed),
            points
                .into_iter()
                .map(|(offset, rate)| CurvePoint::new(day(observed + offset), rate))
                .collect(),
        )
    })
}

/// Market with sparse spot days and curves over the first 60 days.
fn arb_market() -> impl Strategy<Value = MarketData> {
    (
        prop::collection::btree_map(0i64..60, arb_rate(), 1..20),
        prop::collection::btree_set(0i64..60, 0..6),
    )
        .prop_flat_map(|(spots, curve_days)| {
            let curves: Vec<_> = curve_days.into_iter().map(arb_curve).collect();
            (Just(spots), curves)
        })
        .prop_map(|(spots, curves)| {
            let spots = spots
                .into_iter()
                .map(|(offset, rate)| SpotRateObservation::new(day(offset), rate))
                .collect();
            MarketData::new(spots, curves).unwrap()
        })
}

fn arb_position(index: usize) -> impl Strategy<Value = HedgePosition> {
    (
        0i64..60,
        1i64..120,
        arb_rate(),
        1u32..1_000,
        any::<bool>(),
        prop::option::of((0i64..120, prop::option::of(arb_rate()))),
    )
        .prop_map(move |(start, tenor, agreed, units, sold, close)| {
            let side = if sold { Side::Sold } else { Side::Bought };
            let position = HedgePosition::new(
                format!("P-{}", index),
                "DLR",
                side,
                Decimal::from(units) * Decimal::from(1_000),
                day(start),
                day(start + tenor),
                agreed,
            )
            .unwrap();
            match close {
                Some((offset, rate)) => position.with_close(day(start + offset.min(tenor)), rate),
                None => position,
            }
        })
}

fn arb_positions() -> impl Strategy<Value = Vec<HedgePosition>> {
    (1usize..15).prop_flat_map(|n| (0..n).map(arb_position).collect::<Vec<_>>())
}

proptest! {
    // ===================================================================
    // Snapshots are pure: repeated calls give identical results.
    // ===================================================================
    #[test]
    fn snapshot_is_idempotent(
        market in arb_market(),
        positions in arb_positions(),
        as_of in 0i64..90,
    ) {
        let valuer = PortfolioValuer::new(&positions, &market, &[]);
        let first = valuer.snapshot(Some(day(as_of)));
        let second = valuer.snapshot(Some(day(as_of)));
        prop_assert_eq!(first, second);
    }

    // ===================================================================
    // No position is both realized and latent, and every position lands
    // in exactly one bucket of a valued snapshot.
    // ===================================================================
    #[test]
    fn partitions_are_exclusive(
        market in arb_market(),
        positions in arb_positions(),
        as_of in 0i64..90,
    ) {
        let snap = PortfolioValuer::new(&positions, &market, &[]).snapshot(Some(day(as_of)));
        let realized: HashSet<_> = snap.realized.iter().map(|p| p.id().clone()).collect();
        let latent: HashSet<_> = snap.latent.iter().map(|p| p.id().clone()).collect();
        prop_assert!(realized.is_disjoint(&latent));

        if snap.is_valued() {
            prop_assert_eq!(
                snap.priced_count() + snap.unpriced.len() + snap.future_count,
                positions.len()
            );
        } else {
            prop_assert!(snap.totals.is_zero());
            prop_assert_eq!(snap.priced_count(), 0);
        }
    }

    // ===================================================================
    // Period P&L equals the closing totals minus the opening totals.
    // ===================================================================
    #[test]
    fn period_pnl_is_additive(
        market in arb_market(),
        positions in arb_positions(),
        start in 1i64..80,
        length in 0i64..30,
    ) {
        let valuer = PortfolioValuer::new(&positions, &market, &[]);
        let end = start + length;
        let result = valuer.period_pnl(day(start), day(end)).unwrap();
        let opening = valuer.snapshot(Some(day(start - 1)));
        let closing = valuer.snapshot(Some(day(end)));
        prop_assert_eq!(result.pnl, closing.totals - opening.totals);
    }

    // ===================================================================
    // A quoted maturity is returned verbatim; anything past the last
    // quoted maturity has no rate.
    // ===================================================================
    #[test]
    fn interpolation_exact_and_bounded(
        curve in arb_curve(0),
        spot in arb_rate(),
        past in 1i64..400,
    ) {
        let interp = ForwardCurveInterpolator::default();
        for point in &curve.points {
            prop_assert_eq!(interp.interpolate(point.maturity, &curve, spot), Some(point.rate));
        }
        let horizon = curve.horizon().unwrap();
        prop_assert_eq!(interp.interpolate(horizon + Duration::days(past), &curve, spot), None);
    }

    // ===================================================================
    // Every maturity after the observation date and up to the horizon
    // gets a rate.
    // ===================================================================
    #[test]
    fn interpolation_inside_curve_is_priced(
        curve in arb_curve(0),
        spot in arb_rate(),
        offset in 1i64..200,
    ) {
        let target = day(offset);
        let horizon = curve.horizon().unwrap();
        let rate = ForwardCurveInterpolator::default().interpolate(target, &curve, spot);
        prop_assert_eq!(rate.is_some(), target <= horizon);
    }

    // ===================================================================
    // The indexed resolver agrees with the linear scan.
    // ===================================================================
    #[test]
    fn series_index_matches_scan(
        days in prop::collection::vec(0i64..60, 0..30),
        as_of in 0i64..70,
    ) {
        let series: Vec<_> = days
            .iter()
            .enumerate()
            .map(|(i, d)| SpotRateObservation::new(day(*d), Decimal::from(i as i64 + 1)))
            .collect();
        let index = SeriesIndex::new(&series);
        prop_assert_eq!(index.resolve(day(as_of)), resolve_as_of(&series, day(as_of)));
    }

    // ===================================================================
    // `{Monto USD}` resolves to exactly the position's notional.
    // ===================================================================
    #[test]
    fn notional_formula_round_trips(position in arb_position(0)) {
        let defs = vec![CustomFieldDefinition::calculated("f", "Copia", "{Monto USD}")];
        let resolved = CustomFieldFormulaEngine::default().resolve(&position, &defs);
        prop_assert_eq!(
            resolved.value(&FieldId::new("f")),
            Some(&FieldValue::Number(position.notional_usd()))
        );
    }
}
