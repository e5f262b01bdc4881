//! Collaborator interfaces
//!
//! The scan core only talks to these traits. Each vendor (Yahoo, FRED,
//! Robinhood, IBKR, JSON fixtures) is one implementation.

use chrono::NaiveDate;

use crate::core::{
    ContractId, LookbackPeriod, OptionChain, OptionContract, PricePoint, ScanResult,
};

/// Underlying prices, listed expirations and option chains
pub trait MarketDataPort {
    /// Current price of the underlying
    fn spot_price(&self, ticker: &str) -> ScanResult<f64>;

    /// Listed option expirations, in the order the source reports them
    fn listed_expirations(&self, ticker: &str) -> ScanResult<Vec<NaiveDate>>;

    /// Listed strikes for one expiration; `None` when the source has no chain
    fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> ScanResult<Option<OptionChain>>;

    /// Daily closes over the period, oldest first
    fn price_history(&self, ticker: &str, period: LookbackPeriod) -> ScanResult<Vec<PricePoint>>;
}

/// Economic data source for the discount rate
pub trait RiskFreeRateProvider {
    /// Most recent observation of the series in percentage points;
    /// `None` when the series has no observations
    fn latest_rate(&self, series_id: &str) -> ScanResult<Option<f64>>;
}

/// Live option quotes from a broker
pub trait QuoteProvider {
    /// Broker id of the matching listed contract, if any
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>>;

    /// Mark (or adjusted mark) price of a contract
    fn market_price(&self, id: &ContractId) -> ScanResult<f64>;
}

impl<T: MarketDataPort + ?Sized> MarketDataPort for &T {
    fn spot_price(&self, ticker: &str) -> ScanResult<f64> {
        (**self).spot_price(ticker)
    }

    fn listed_expirations(&self, ticker: &str) -> ScanResult<Vec<NaiveDate>> {
        (**self).listed_expirations(ticker)
    }

    fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> ScanResult<Option<OptionChain>> {
        (**self).option_chain(ticker, expiration)
    }

    fn price_history(&self, ticker: &str, period: LookbackPeriod) -> ScanResult<Vec<PricePoint>> {
        (**self).price_history(ticker, period)
    }
}
