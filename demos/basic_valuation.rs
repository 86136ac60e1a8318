//! Value a small hedge book on one date.
//!
//! Shows realized and latent positions, curve interpolation and a pair
//! of calculated custom fields.

use chrono::NaiveDate;
use hedge_mtm_engine::prelude::*;
use rust_decimal_macros::dec;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).expect("valid demo date")
}

fn main() {
    println!("╔════════════════════════════════════════════╗");
    println!("║  hedge-mtm-engine: Basic Valuation Example  ║");
    println!("╚════════════════════════════════════════════╝\n");

    let market = MarketData::new(
        vec![
            SpotRateObservation::new(date(1, 10), dec!(1000)),
            SpotRateObservation::new(date(1, 20), dec!(1020)),
        ],
        vec![
            ForwardCurveSnapshot::new(
                date(1, 10),
                vec![
                    CurvePoint::new(date(2, 10), dec!(1050)),
                    CurvePoint::new(date(3, 10), dec!(1100)),
                ],
            ),
            ForwardCurveSnapshot::new(
                date(1, 20),
                vec![
                    CurvePoint::new(date(2, 10), dec!(1060)),
                    CurvePoint::new(date(3, 10), dec!(1115)),
                    CurvePoint::new(date(4, 10), dec!(1170)),
                ],
            ),
        ],
    )
    .expect("valid market data");

    let positions = vec![
        HedgePosition::new("H-1", "DLR/FEB24", Side::Sold, dec!(100_000), date(1, 2), date(2, 25), dec!(1080))
            .expect("valid position"),
        HedgePosition::new("H-2", "DLR/FEB24", Side::Sold, dec!(100_000), date(1, 2), date(2, 25), dec!(1080))
            .expect("valid position")
            .with_close(date(1, 20), Some(dec!(1060))),
        HedgePosition::new("H-3", "DLR/MAR24", Side::Bought, dec!(250_000), date(1, 8), date(3, 28), dec!(1095))
            .expect("valid position")
            .with_custom_value("m-1", FieldValue::Number(dec!(1500))),
        HedgePosition::new("H-4", "DLR/JUN24", Side::Sold, dec!(50_000), date(1, 15), date(6, 28), dec!(1250))
            .expect("valid position"),
    ];

    let fields = vec![
        CustomFieldDefinition::manual("m-1", "Comision", FieldDataType::Number),
        CustomFieldDefinition::calculated("c-1", "Cobertura ARS", "{Monto USD} * {Tipo de Cambio}"),
        CustomFieldDefinition::calculated("c-2", "Neto USD", "{Monto USD} - {Comision}"),
    ];

    // --- Snapshot before the early close ---
    println!("━━━ As of 2024-01-15 ━━━\n");
    let valuer = PortfolioValuer::new(&positions, &market, &fields);
    println!("{}", valuer.snapshot(Some(date(1, 15))));

    // --- Snapshot after it ---
    println!("━━━ As of 2024-01-25 ━━━\n");
    let snapshot = valuer.snapshot(Some(date(1, 25)));
    println!("{}", snapshot);

    println!("━━━ Custom Fields ━━━\n");
    for row in snapshot.priced() {
        print!("  {:<6}", row.id().as_str());
        for (id, value) in &row.custom_fields {
            print!("  {}={}", id, value);
        }
        for (id, issue) in &row.field_issues {
            print!("  {}: {}", id, issue);
        }
        println!();
    }
}
