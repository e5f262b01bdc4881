//! Option contract definitions
//!
//! Listed equity options identified by (ticker, expiration, strike, type).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::ScanError;

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    Call,
    Put,
}

impl OptionType {
    /// Payoff direction: +1 for call, -1 for put
    pub fn phi(&self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Intrinsic value at given spot
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }

    /// Single-letter right code ("C" / "P")
    pub fn right(&self) -> &'static str {
        match self {
            OptionType::Call => "C",
            OptionType::Put => "P",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(ScanError::invalid_input(format!(
                "unknown option type '{}', expected call or put",
                s
            ))),
        }
    }
}

/// Option contract specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying symbol (e.g., "AAPL")
    pub ticker: String,
    /// Expiration date
    pub expiration: NaiveDate,
    /// Strike price
    pub strike: f64,
    /// Option type (Call/Put)
    pub option_type: OptionType,
}

impl OptionContract {
    pub fn new(
        ticker: impl Into<String>,
        expiration: NaiveDate,
        strike: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            expiration,
            strike,
            option_type,
        }
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:.2} {}",
            self.ticker, self.expiration, self.strike, self.option_type
        )
    }
}

/// Broker-assigned contract identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listed strikes for a single expiration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub calls: Vec<f64>,
    pub puts: Vec<f64>,
}

impl OptionChain {
    pub fn new(calls: Vec<f64>, puts: Vec<f64>) -> Self {
        Self { calls, puts }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }

    /// Sorted, de-duplicated union of call and put strikes
    pub fn strikes(&self) -> Vec<f64> {
        let mut strikes: Vec<f64> = self
            .calls
            .iter()
            .chain(self.puts.iter())
            .copied()
            .filter(|k| k.is_finite())
            .collect();
        strikes.sort_by(f64::total_cmp);
        strikes.dedup();
        strikes
    }
}
