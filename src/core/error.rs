//! Error types for option scanning

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("No option chain for {ticker} expiring {expiration}")]
    NoChainData { ticker: String, expiration: NaiveDate },

    #[error("Insufficient price history for {ticker}: {observations} valid close(s), need at least 3")]
    InsufficientHistory { ticker: String, observations: usize },

    #[error("Risk-free rate unavailable: {0}")]
    RateUnavailable(String),

    /// Never raised by the scan: a contract the broker does not list is
    /// recorded with `market_price: None` instead.
    #[error("No contract for {ticker} {expiration} {strike}")]
    ContractNotFound {
        ticker: String,
        expiration: NaiveDate,
        strike: f64,
    },

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

impl ScanError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    pub fn rate_unavailable(msg: impl Into<String>) -> Self {
        Self::RateUnavailable(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Errors confined to a single ticker, expiration or strike.
    ///
    /// The scan skips the affected item and keeps going. Anything else
    /// aborts the run.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::DegenerateInput(_)
                | Self::NoChainData { .. }
                | Self::InsufficientHistory { .. }
                | Self::ContractNotFound { .. }
                | Self::ProviderUnavailable(_)
                | Self::Data(_)
        )
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
