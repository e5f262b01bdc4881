//! # Option Scan - Black-Scholes fair values against broker marks
//!
//! Prices listed equity options with the Black-Scholes closed form and
//! compares each theoretical value with the live mark quoted by a broker.
//!
//! ## Overview
//!
//! For every ticker, expiration inside the lookahead horizon and strike
//! inside a percent band around spot, the scan:
//! - estimates annualized historical volatility from daily closes
//! - computes time to maturity in calendar years (days / 365)
//! - discounts at the latest risk-free rate (FRED, percent / 100)
//! - looks up the broker's mark for the same contract
//!
//! ## Key Components
//!
//! - **Ports**: `MarketDataPort`, `RiskFreeRateProvider`, `QuoteProvider`
//! - **Vendors**: Yahoo Finance, FRED, Robinhood, IBKR Client Portal, JSON fixtures
//! - **Black-Scholes**: closed-form European pricing with a degenerate-input policy
//! - **Scanner**: the ticker -> expiration -> strike sweep
//!
//! ## Usage
//!
//! ```rust,no_run
//! use option_scan::prelude::*;
//!
//! let market = FixtureMarket::from_path("demos/fixture.json").unwrap();
//! let request = ScanRequest::new(["AAPL"]).with_horizon_months(3);
//!
//! let report = with_session(&market, &Credentials::default(), |session| {
//!     Scanner::new(&market, &market, session).run(&request)
//! })
//! .unwrap();
//!
//! for record in &report.records {
//!     println!("{} {} {:?} {:?}", record.expiration, record.strike,
//!         record.model_price, record.market_price);
//! }
//! ```
//!
//! ## What This Does NOT Do
//!
//! - Model American early exercise or dividends
//! - Build implied volatility surfaces
//! - Place orders

pub mod config;
pub mod core;
pub mod data;
pub mod estimation;
pub mod models;
pub mod report;
pub mod scan;

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{
        ComparisonRecord, ContractId, LookbackPeriod, MarketSnapshot, OptionChain,
        OptionContract, OptionType, PricePoint, ScanError, ScanRequest, ScanResult,
    };

    // Ports and adapters
    pub use crate::data::{
        with_session, Broker, BrokerSession, CacheConfig, CachedMarketData, Credentials,
        FixtureMarket, FredClient, IbkrBroker, MarketDataPort, QuoteProvider,
        RiskFreeRateProvider, RobinhoodBroker, YahooClient,
    };

    // Estimation
    pub use crate::estimation::{annualized_volatility, risk_free_rate, ParameterEstimator};

    // Models
    pub use crate::models::{
        price as bs_price, price_snapshot, price_with_policy, DegeneratePolicy,
    };

    // Scan and output
    pub use crate::config::ScanConfig;
    pub use crate::report::{render, OutputFormat};
    pub use crate::scan::{ScanReport, Scanner, SkippedItem};
}

// Re-export main types at crate root
pub use crate::core::{ScanError, ScanResult};
pub use crate::scan::{ScanReport, Scanner};
