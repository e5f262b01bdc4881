//! Market parameter estimation
//!
//! Turns raw market data into Black-Scholes inputs:
//! - viable expirations inside the lookahead horizon
//! - viable strikes inside a percent band around spot
//! - time to maturity (calendar days / 365)
//! - annualized historical volatility (sample std of log returns * sqrt(252))
//! - risk-free rate as a decimal fraction

pub mod filters;
pub mod rate;
pub mod volatility;

pub use filters::*;
pub use rate::*;
pub use volatility::*;

use chrono::{NaiveDate, Utc};

use crate::core::{LookbackPeriod, ScanError, ScanResult};
use crate::data::MarketDataPort;

/// Estimates valuation inputs from a market data source as of one date
pub struct ParameterEstimator<'a> {
    market: &'a dyn MarketDataPort,
    today: NaiveDate,
}

impl<'a> ParameterEstimator<'a> {
    /// Estimator evaluated as of today's UTC date
    pub fn new(market: &'a dyn MarketDataPort) -> Self {
        Self::as_of(market, Utc::now().date_naive())
    }

    /// Estimator evaluated as of a fixed date
    pub fn as_of(market: &'a dyn MarketDataPort, today: NaiveDate) -> Self {
        Self { market, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Listed expirations within `horizon_months * 30` days, source order kept
    pub fn viable_expirations(&self, ticker: &str, horizon_months: u32) -> ScanResult<Vec<NaiveDate>> {
        let listed = self.market.listed_expirations(ticker)?;
        let viable = filter_expirations(&listed, self.today, horizon_months);

        tracing::debug!(
            ticker,
            listed = listed.len(),
            viable = viable.len(),
            "Filtered expirations"
        );
        Ok(viable)
    }

    /// Strikes within +/- `band_percent` of the current spot, ascending and unique
    pub fn viable_strikes(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        band_percent: f64,
    ) -> ScanResult<Vec<f64>> {
        let spot = self.spot_price(ticker)?;

        let chain = self
            .market
            .option_chain(ticker, expiration)?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ScanError::NoChainData {
                ticker: ticker.to_string(),
                expiration,
            })?;

        Ok(filter_strikes(&chain, spot, band_percent))
    }

    /// Current spot, validated positive
    pub fn spot_price(&self, ticker: &str) -> ScanResult<f64> {
        let spot = self.market.spot_price(ticker)?;
        if !(spot.is_finite() && spot > 0.0) {
            return Err(ScanError::data(format!(
                "non-positive spot {} for {}",
                spot, ticker
            )));
        }
        Ok(spot)
    }

    /// Years until `expiration`; negative for past dates
    pub fn time_to_maturity(&self, expiration: NaiveDate) -> f64 {
        time_to_maturity(expiration, self.today)
    }

    /// Annualized volatility of daily log returns over `lookback`
    pub fn historical_volatility(&self, ticker: &str, lookback: LookbackPeriod) -> ScanResult<f64> {
        let history = self.market.price_history(ticker, lookback)?;
        let closes: Vec<f64> = history
            .iter()
            .map(|p| p.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();

        annualized_volatility(&closes).ok_or_else(|| ScanError::InsufficientHistory {
            ticker: ticker.to_string(),
            observations: closes.len(),
        })
    }
}
