//! Scan inputs and outputs
//!
//! ScanRequest describes the sweep; ComparisonRecord is one row of the result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{ScanError, ScanResult};
use super::market::LookbackPeriod;
use super::option::OptionType;

/// Default FRED series: 10-year Treasury constant maturity
pub const DEFAULT_RATE_SERIES: &str = "DGS10";

/// Sweep definition for one scan run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Underlyings, scanned in this order
    pub tickers: Vec<String>,
    /// Expirations later than today + horizon_months * 30 days are ignored
    pub horizon_months: u32,
    /// Strike band as +/- percent around spot
    pub band_percent: f64,
    /// Option type to value and quote
    pub option_type: OptionType,
    /// History window for volatility
    pub lookback: LookbackPeriod,
    /// Risk-free rate series identifier
    pub rate_series: String,
}

impl ScanRequest {
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            horizon_months: 6,
            band_percent: 10.0,
            option_type: OptionType::Call,
            lookback: LookbackPeriod::OneYear,
            rate_series: DEFAULT_RATE_SERIES.to_string(),
        }
    }

    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = months;
        self
    }

    pub fn with_band_percent(mut self, band: f64) -> Self {
        self.band_percent = band;
        self
    }

    pub fn with_option_type(mut self, option_type: OptionType) -> Self {
        self.option_type = option_type;
        self
    }

    pub fn with_lookback(mut self, lookback: LookbackPeriod) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_rate_series(mut self, series: impl Into<String>) -> Self {
        self.rate_series = series.into();
        self
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.tickers.is_empty() {
            return Err(ScanError::invalid_input("no tickers to scan"));
        }
        if let Some(blank) = self.tickers.iter().find(|t| t.trim().is_empty()) {
            return Err(ScanError::invalid_input(format!("blank ticker '{}'", blank)));
        }
        if self.horizon_months == 0 {
            return Err(ScanError::invalid_input("horizon must be at least one month"));
        }
        if !(self.band_percent > 0.0 && self.band_percent < 100.0) {
            return Err(ScanError::invalid_input(format!(
                "strike band must be within (0, 100) percent, got {}",
                self.band_percent
            )));
        }
        if self.rate_series.trim().is_empty() {
            return Err(ScanError::invalid_input("rate series id is empty"));
        }
        Ok(())
    }
}

/// Model price against market price for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub strike: f64,
    pub option_type: OptionType,
    /// Black-Scholes value; absent only under a policy that tolerates it
    pub model_price: Option<f64>,
    /// Broker mark; absent when no matching contract was listed
    pub market_price: Option<f64>,
}

impl ComparisonRecord {
    /// Market minus model, when both sides are known
    pub fn difference(&self) -> Option<f64> {
        match (self.market_price, self.model_price) {
            (Some(market), Some(model)) => Some(market - model),
            _ => None,
        }
    }
}
