//! Example: full scan against a recorded market snapshot
//!
//! Run with: cargo run --example offline_scan [-- path/to/fixture.json]

use std::io;

use option_scan::prelude::*;

fn main() -> ScanResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fixture.json").to_string());
    let market = FixtureMarket::from_path(&path)?;

    for option_type in [OptionType::Call, OptionType::Put] {
        let request = ScanRequest::new(["AAPL", "MSFT", "LEAP"])
            .with_horizon_months(6)
            .with_band_percent(5.0)
            .with_option_type(option_type);

        let report = with_session(&market, &Credentials::default(), |session| {
            let mut scanner = Scanner::new(&market, &market, session);
            if let Some(date) = market.as_of() {
                scanner = scanner.with_as_of(date);
            }
            scanner.run(&request)
        })?;

        println!("=== {} scan ===\n", option_type);
        render(&report, OutputFormat::Table, io::stdout().lock())?;
        println!();
    }

    Ok(())
}
