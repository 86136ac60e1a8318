//! hedge-mtm CLI
//!
//! Value an FX hedge portfolio from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Snapshot as of a date
//! hedge-mtm value --input portfolio.json --as-of 2024-03-28
//!
//! # Period P&L as JSON
//! hedge-mtm period --input portfolio.json --start 2024-03-01 --end 2024-03-31 --format json
//!
//! # Daily totals
//! hedge-mtm ladder --input portfolio.json --from 2024-03-01 --to 2024-03-31
//!
//! # Generate a random portfolio for testing
//! hedge-mtm generate --positions 40 --days 120 --seed 7
//! ```

use hedge_mtm_engine::core::config::ValuationConfig;
use hedge_mtm_engine::core::field::CustomFieldDefinition;
use hedge_mtm_engine::core::market::{ForwardCurveSnapshot, MarketData, SpotRateObservation};
use hedge_mtm_engine::core::position::HedgePosition;
use hedge_mtm_engine::simulation::generator::{generate_portfolio, PortfolioConfig};
use hedge_mtm_engine::valuation::resolver::parse_as_of;
use hedge_mtm_engine::valuation::snapshot::PortfolioValuer;
use chrono::NaiveDate;
use log::info;
use std::collections::HashMap;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"hedge-mtm: point-in-time mark-to-market for FX hedge portfolios

USAGE:
    hedge-mtm <COMMAND> [OPTIONS]

COMMANDS:
    value       Value the portfolio as of a date
    period      P&L between two dates (start-1 vs end)
    ladder      Daily totals over a date range
    generate    Generate a random portfolio file (for testing)
    help        Show this message

OPTIONS (value, period, ladder):
    --input <FILE>      Path to JSON portfolio file
    --config <FILE>     Path to JSON valuation config
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (value):
    --as-of <DATE>      Valuation date (YYYY-MM-DD)

OPTIONS (period):
    --start <DATE>      First day of the period
    --end <DATE>        Last day of the period

OPTIONS (ladder):
    --from <DATE>       First day
    --to <DATE>         Last day

OPTIONS (generate):
    --positions <N>     Number of positions (default: 50)
    --days <N>          Days of market history (default: 90)
    --seed <N>          Random seed (default: 42)
    --output <FILE>     Write to file instead of stdout

Set RUST_LOG=debug to see why positions or fields were skipped."#
    );
}

/// JSON schema of a portfolio file.
#[derive(serde::Deserialize, serde::Serialize)]
struct PortfolioFile {
    #[serde(default)]
    spot_rates: Vec<SpotRateObservation>,
    #[serde(default)]
    forward_curves: Vec<ForwardCurveSnapshot>,
    #[serde(default)]
    positions: Vec<HedgePosition>,
    #[serde(default)]
    field_definitions: Vec<CustomFieldDefinition>,
}

struct Portfolio {
    market: MarketData,
    positions: Vec<HedgePosition>,
    fields: Vec<CustomFieldDefinition>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Parse `--key value` pairs, rejecting keys not in `allowed`.
fn parse_options(args: &[String], allowed: &[&str]) -> HashMap<String, String> {
    let mut options = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let key = args[i].as_str();
        if !allowed.contains(&key) {
            eprintln!("Unknown option: {}", key);
            process::exit(1);
        }
        i += 1;
        let value = args
            .get(i)
            .cloned()
            .unwrap_or_else(|| fail(format!("{} requires a value", key)));
        options.insert(key.trim_start_matches("--").to_string(), value);
        i += 1;
    }
    options
}

fn required<'a>(options: &'a HashMap<String, String>, key: &str) -> &'a str {
    options
        .get(key)
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("--{} is required", key)))
}

fn date_option(options: &HashMap<String, String>, key: &str) -> NaiveDate {
    let raw = required(options, key);
    parse_as_of(raw).unwrap_or_else(|| fail(format!("invalid date for --{}: '{}'", key, raw)))
}

fn load_config(options: &HashMap<String, String>) -> ValuationConfig {
    match options.get("config") {
        Some(path) => ValuationConfig::from_file(path).unwrap_or_else(|e| fail(e)),
        None => ValuationConfig::default(),
    }
}

fn load_portfolio(path: &str) -> Portfolio {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path, e)));

    let file: PortfolioFile = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "spot_rates": [ {{ "date": "2024-01-10", "rate": "1000" }} ],
  "forward_curves": [
    {{ "observed_on": "2024-01-10", "points": [ {{ "maturity": "2024-02-10", "rate": "1050" }} ] }}
  ],
  "positions": [
    {{ "id": "H-1", "instrument": "DLR/FEB24", "side": "sold", "notional_usd": "100000",
      "start_date": "2024-01-02", "maturity_date": "2024-02-25", "agreed_rate": "1080" }}
  ],
  "field_definitions": []
}}"#
        );
        process::exit(1);
    });

    let market = MarketData::new(file.spot_rates, file.forward_curves)
        .unwrap_or_else(|e| fail(format!("invalid market data: {}", e)));
    for position in &file.positions {
        if let Err(e) = position.validate() {
            fail(e);
        }
    }
    info!(
        "loaded {} positions, {} spot rates, {} curves",
        file.positions.len(),
        market.spot_rates().len(),
        market.forward_curves().len()
    );

    Portfolio {
        market,
        positions: file.positions,
        fields: file.field_definitions,
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("cannot serialize output: {}", e)),
    }
}

fn cmd_value(args: &[String]) {
    let options = parse_options(args, &["--input", "--config", "--format", "--as-of"]);
    let portfolio = load_portfolio(required(&options, "input"));
    let config = load_config(&options);
    let valuer = PortfolioValuer::with_config(
        &portfolio.positions,
        &portfolio.market,
        &portfolio.fields,
        &config,
    );

    // An unparseable date is not an error here: it yields the empty snapshot.
    let snapshot = valuer.snapshot_str(required(&options, "as-of"));

    if options.get("format").map(String::as_str) == Some("json") {
        print_json(&snapshot);
    } else {
        println!("{}", snapshot);
    }
}

fn cmd_period(args: &[String]) {
    let options = parse_options(args, &["--input", "--config", "--format", "--start", "--end"]);
    let portfolio = load_portfolio(required(&options, "input"));
    let config = load_config(&options);
    let valuer = PortfolioValuer::with_config(
        &portfolio.positions,
        &portfolio.market,
        &portfolio.fields,
        &config,
    );

    let result = valuer
        .period_pnl(date_option(&options, "start"), date_option(&options, "end"))
        .unwrap_or_else(|e| fail(e));

    if options.get("format").map(String::as_str) == Some("json") {
        print_json(&result);
    } else {
        println!("{}", result);
    }
}

fn cmd_ladder(args: &[String]) {
    let options = parse_options(args, &["--input", "--config", "--format", "--from", "--to"]);
    let portfolio = load_portfolio(required(&options, "input"));
    let config = load_config(&options);
    let valuer = PortfolioValuer::with_config(
        &portfolio.positions,
        &portfolio.market,
        &portfolio.fields,
        &config,
    );

    let rows = valuer
        .daily_totals(date_option(&options, "from"), date_option(&options, "to"))
        .unwrap_or_else(|e| fail(e));

    if options.get("format").map(String::as_str) == Some("json") {
        print_json(&rows);
        return;
    }
    println!(
        "{:<12} {:>18} {:>18} {:>18} {:>9}",
        "DATE", "REALIZED", "LATENT", "TOTAL", "UNPRICED"
    );
    for row in rows {
        if !row.valued {
            println!("{:<12} {:>18}", row.date.to_string(), "(no spot)");
            continue;
        }
        println!(
            "{:<12} {:>18} {:>18} {:>18} {:>9}",
            row.date.to_string(),
            row.realized.quote.round_dp(2),
            row.latent.quote.round_dp(2),
            row.totals.quote.round_dp(2),
            row.unpriced
        );
    }
}

fn cmd_generate(args: &[String]) {
    let options = parse_options(args, &["--positions", "--days", "--seed", "--output"]);
    let mut config = PortfolioConfig::default();
    if let Some(n) = options.get("positions") {
        config.position_count = n
            .parse()
            .unwrap_or_else(|_| fail("--positions requires a number"));
    }
    if let Some(n) = options.get("days") {
        config.days = n.parse().unwrap_or_else(|_| fail("--days requires a number"));
    }
    if let Some(n) = options.get("seed") {
        config.seed = n.parse().unwrap_or_else(|_| fail("--seed requires a number"));
    }

    let generated = generate_portfolio(&config);
    let output = PortfolioFile {
        spot_rates: generated.market.spot_rates().to_vec(),
        forward_curves: generated.market.forward_curves().to_vec(),
        positions: generated.positions,
        field_definitions: Vec::new(),
    };
    let json = serde_json::to_string_pretty(&output)
        .unwrap_or_else(|e| fail(format!("cannot serialize output: {}", e)));

    if let Some(path) = options.get("output") {
        fs::write(path, &json).unwrap_or_else(|e| fail(format!("cannot write '{}': {}", path, e)));
        eprintln!(
            "Generated {} positions over {} days to {}",
            output.positions.len(),
            config.days,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "value" => cmd_value(rest),
        "period" => cmd_period(rest),
        "ladder" => cmd_ladder(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
