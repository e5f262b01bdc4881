//! Option Scan CLI
//!
//! `option-scan scan` compares Black-Scholes values with broker marks;
//! `option-scan price` values a single contract from explicit inputs.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use option_scan::config::{build_config, BrokerKind, CliOverrides, LogLevel, ScanConfig};
use option_scan::prelude::*;

/// Black-Scholes fair values against live broker quotes
#[derive(Parser, Debug)]
#[command(name = "option-scan")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan tickers and compare model prices with market marks
    Scan(ScanArgs),
    /// Price a single European option
    Price(PriceArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Underlying tickers (space or comma separated)
    tickers: Vec<String>,

    /// Configuration file path (TOML format)
    #[arg(short, long, value_name = "FILE", env = "OPTION_SCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Lookahead horizon in months
    #[arg(long)]
    horizon: Option<u32>,

    /// Strike band as +/- percent around spot
    #[arg(long)]
    band: Option<f64>,

    /// Option type (call, put)
    #[arg(short = 't', long = "type")]
    option_type: Option<OptionType>,

    /// Volatility lookback (1mo, 3mo, 6mo, 1y, 2y, 5y)
    #[arg(long)]
    lookback: Option<LookbackPeriod>,

    /// FRED series for the risk-free rate
    #[arg(long)]
    rate_series: Option<String>,

    /// Quote source (robinhood, ibkr, fixture)
    #[arg(short, long)]
    broker: Option<BrokerKind>,

    /// JSON market snapshot; implies the fixture broker
    #[arg(long, value_name = "FILE")]
    fixture: Option<PathBuf>,

    /// Price expiring or zero-vol contracts at intrinsic value
    #[arg(long)]
    intrinsic_fallback: bool,

    /// Output format (table, csv, json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Bypass the on-disk cache
    #[arg(long)]
    no_cache: bool,
}

impl From<ScanArgs> for CliOverrides {
    fn from(args: ScanArgs) -> Self {
        let broker = match (&args.fixture, args.broker) {
            (Some(_), None) => Some(BrokerKind::Fixture),
            (_, kind) => kind,
        };

        CliOverrides {
            config_file: args.config,
            tickers: args.tickers,
            horizon_months: args.horizon,
            band_percent: args.band,
            option_type: args.option_type,
            lookback: args.lookback,
            rate_series: args.rate_series,
            degenerate_policy: args.intrinsic_fallback.then_some(DegeneratePolicy::Intrinsic),
            format: args.format,
            log_level: args.log_level,
            broker,
            fixture: args.fixture,
            no_cache: args.no_cache,
        }
    }
}

#[derive(Args, Debug)]
struct PriceArgs {
    /// Underlying spot price
    #[arg(long)]
    spot: f64,

    /// Strike price
    #[arg(long)]
    strike: f64,

    /// Time to maturity in years
    #[arg(long, conflicts_with = "days")]
    time: Option<f64>,

    /// Calendar days to expiration (converted with a 365-day year)
    #[arg(long)]
    days: Option<u32>,

    /// Risk-free rate as a decimal (0.05 = 5%)
    #[arg(long, allow_hyphen_values = true)]
    rate: f64,

    /// Annualized volatility as a decimal
    #[arg(long)]
    vol: f64,

    /// Option type (call, put)
    #[arg(short = 't', long = "type", default_value = "call")]
    option_type: OptionType,

    /// Return intrinsic value instead of failing when T <= 0 or vol == 0
    #[arg(long)]
    intrinsic_fallback: bool,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Which precondition a fatal scan error belongs to
fn failed_step(err: &ScanError) -> &'static str {
    match err {
        ScanError::RateUnavailable(_) => "risk-free rate lookup failed",
        ScanError::Authentication(_) => "broker login failed",
        ScanError::InvalidInput(_) => "invalid scan request",
        _ => "scan aborted",
    }
}

/// Wrap the market source in the on-disk cache when configured
fn market_source<P>(market: P, config: &ScanConfig) -> Result<Box<dyn MarketDataPort>>
where
    P: MarketDataPort + 'static,
{
    if config.cache.enabled {
        let cached = CachedMarketData::new(market, config.cache.clone())
            .context("failed to prepare market data cache")?;
        Ok(Box::new(cached))
    } else {
        Ok(Box::new(market))
    }
}

fn scan_with<B: Broker>(
    broker: &B,
    credentials: &Credentials,
    market: &dyn MarketDataPort,
    rates: &dyn RiskFreeRateProvider,
    config: &ScanConfig,
    as_of: Option<NaiveDate>,
) -> Result<ScanReport> {
    let request = config.to_request();

    with_session(broker, credentials, |session| {
        let mut scanner = Scanner::new(market, rates, session).with_policy(config.degenerate_policy);
        if let Some(date) = as_of {
            scanner = scanner.with_as_of(date);
        }
        scanner.run(&request)
    })
    .map_err(|e| {
        let step = failed_step(&e);
        anyhow::Error::new(e).context(step)
    })
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let overrides: CliOverrides = args.into();
    let config = build_config(&overrides).context("invalid configuration")?;

    init_tracing(config.log_level.as_filter_str());
    tracing::info!(
        tickers = ?config.tickers,
        broker = %config.broker.kind,
        horizon_months = config.horizon_months,
        band_percent = config.band_percent,
        option_type = %config.option_type,
        lookback = %config.lookback,
        rate_series = %config.rate_series,
        policy = %config.degenerate_policy,
        "Scan configuration loaded"
    );

    let credentials = config.broker.credentials()?;

    let report = match config.broker.kind {
        BrokerKind::Fixture => {
            let Some(path) = &config.broker.fixture else {
                bail!("the fixture broker needs --fixture <FILE>");
            };
            let fixture = FixtureMarket::from_path(path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?;
            let market = market_source(fixture.clone(), &config)?;
            scan_with(
                &fixture,
                &credentials,
                market.as_ref(),
                &fixture,
                &config,
                fixture.as_of(),
            )?
        }
        kind => {
            let api_key = config
                .fred_api_key
                .clone()
                .context("risk-free rate lookup needs FRED_API_KEY")?;
            let rates = FredClient::new(api_key, config.timeout())?;
            let market = market_source(YahooClient::new(config.timeout())?, &config)?;

            if kind == BrokerKind::Ibkr {
                let mut broker = IbkrBroker::new(config.timeout())?;
                if let Some(url) = &config.broker.gateway_url {
                    broker = broker.with_base_url(url.clone());
                }
                scan_with(&broker, &credentials, market.as_ref(), &rates, &config, None)?
            } else {
                let mut broker = RobinhoodBroker::new(config.timeout())?;
                if let Some(token) = &config.broker.device_token {
                    broker = broker.with_device_token(token.clone());
                }
                scan_with(&broker, &credentials, market.as_ref(), &rates, &config, None)?
            }
        }
    };

    render(&report, config.format, io::stdout().lock()).context("failed to write report")?;
    Ok(())
}

fn run_price(args: PriceArgs) -> Result<()> {
    init_tracing(LogLevel::Warn.as_filter_str());

    let time = match (args.time, args.days) {
        (Some(t), _) => t,
        (None, Some(days)) => f64::from(days) / 365.0,
        (None, None) => bail!("either --time or --days is required"),
    };
    let policy = if args.intrinsic_fallback {
        DegeneratePolicy::Intrinsic
    } else {
        DegeneratePolicy::FailFast
    };

    let value = price_with_policy(
        args.spot,
        args.strike,
        time,
        args.rate,
        args.vol,
        args.option_type,
        policy,
    )
    .context("pricing failed")?;

    println!(
        "{} S={:.2} K={:.2} T={:.4}y r={:.4} vol={:.4}: {:.4}",
        args.option_type, args.spot, args.strike, time, args.rate, args.vol, value
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scan(args) => run_scan(args),
        Command::Price(args) => run_price(args),
    }
}
