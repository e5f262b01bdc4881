//! Market inputs for valuation
//!
//! - PricePoint: one daily close
//! - LookbackPeriod: history window for volatility estimation
//! - MarketSnapshot: the sufficient statistic handed to the pricer

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{ScanError, ScanResult};

/// Daily closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// History window used for historical volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl LookbackPeriod {
    /// Range string understood by chart endpoints ("1y", "6mo", ...)
    pub fn as_range(&self) -> &'static str {
        match self {
            LookbackPeriod::OneMonth => "1mo",
            LookbackPeriod::ThreeMonths => "3mo",
            LookbackPeriod::SixMonths => "6mo",
            LookbackPeriod::OneYear => "1y",
            LookbackPeriod::TwoYears => "2y",
            LookbackPeriod::FiveYears => "5y",
        }
    }

    /// Approximate number of trading sessions in the window
    pub fn trading_days(&self) -> usize {
        match self {
            LookbackPeriod::OneMonth => 21,
            LookbackPeriod::ThreeMonths => 63,
            LookbackPeriod::SixMonths => 126,
            LookbackPeriod::OneYear => 252,
            LookbackPeriod::TwoYears => 504,
            LookbackPeriod::FiveYears => 1260,
        }
    }
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_range())
    }
}

impl FromStr for LookbackPeriod {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1mo" => Ok(LookbackPeriod::OneMonth),
            "3mo" => Ok(LookbackPeriod::ThreeMonths),
            "6mo" => Ok(LookbackPeriod::SixMonths),
            "1y" => Ok(LookbackPeriod::OneYear),
            "2y" => Ok(LookbackPeriod::TwoYears),
            "5y" => Ok(LookbackPeriod::FiveYears),
            _ => Err(ScanError::invalid_input(format!(
                "unknown lookback period '{}', expected one of 1mo, 3mo, 6mo, 1y, 2y, 5y",
                s
            ))),
        }
    }
}

/// Inputs for a single Black-Scholes valuation.
///
/// Built fresh for every (ticker, expiration) pass of a scan and never
/// shared between passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketSnapshot {
    /// Underlying spot price
    pub spot: f64,
    /// Risk-free rate as a decimal fraction
    pub rate: f64,
    /// Annualized volatility
    pub volatility: f64,
    /// Time to maturity in years
    pub time_to_maturity: f64,
}

impl MarketSnapshot {
    pub fn new(spot: f64, rate: f64, volatility: f64, time_to_maturity: f64) -> ScanResult<Self> {
        if !(spot.is_finite() && spot > 0.0) {
            return Err(ScanError::invalid_input(format!(
                "spot must be positive, got {}",
                spot
            )));
        }
        if !rate.is_finite() {
            return Err(ScanError::invalid_input("rate must be finite"));
        }
        if !(volatility.is_finite() && volatility >= 0.0) {
            return Err(ScanError::invalid_input(format!(
                "volatility must be non-negative, got {}",
                volatility
            )));
        }
        if !time_to_maturity.is_finite() || time_to_maturity < 0.0 {
            return Err(ScanError::degenerate(format!(
                "time to maturity must be non-negative, got {}",
                time_to_maturity
            )));
        }

        Ok(Self {
            spot,
            rate,
            volatility,
            time_to_maturity,
        })
    }

    /// True when the closed form is undefined (zero vol or no time left)
    pub fn is_degenerate(&self) -> bool {
        self.time_to_maturity <= 0.0 || self.volatility == 0.0
    }
}
