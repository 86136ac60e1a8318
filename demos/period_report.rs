//! Period P&L and a daily ladder over a generated portfolio.

use chrono::Duration;
use hedge_mtm_engine::simulation::generator::{generate_portfolio, PortfolioConfig};
use hedge_mtm_engine::valuation::snapshot::PortfolioValuer;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  hedge-mtm-engine: Period Report Example  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let config = PortfolioConfig {
        position_count: 80,
        days: 120,
        seed: 2024,
        ..Default::default()
    };
    let generated = generate_portfolio(&config);
    println!(
        "Generated {} positions, {} spot days, {} curves\n",
        generated.positions.len(),
        generated.market.spot_rates().len(),
        generated.market.forward_curves().len()
    );

    let valuer = PortfolioValuer::new(&generated.positions, &generated.market, &[]);

    // --- Monthly results ---
    println!("━━━ Monthly P&L ━━━\n");
    let mut start = config.start_date + Duration::days(1);
    for _ in 0..3 {
        let end = start + Duration::days(29);
        match valuer.period_pnl(start, end) {
            Ok(result) => println!("{}", result),
            Err(e) => println!("  {}: {}", start, e),
        }
        start = end + Duration::days(1);
    }

    // --- Last two weeks, day by day ---
    println!("━━━ Daily Ladder ━━━\n");
    let to = config.start_date + Duration::days(config.days as i64 - 1);
    let from = to - Duration::days(13);
    let rows = match valuer.daily_totals(from, to) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("ladder failed: {}", e);
            return;
        }
    };
    println!("  {:<12} {:>18} {:>18} {:>18}", "DATE", "REALIZED", "LATENT", "TOTAL");
    for row in rows {
        println!(
            "  {:<12} {:>18} {:>18} {:>18}",
            row.date.to_string(),
            row.realized.quote.round_dp(2),
            row.latent.quote.round_dp(2),
            row.totals.quote.round_dp(2),
        );
    }
}
