//! JSON market fixtures
//!
//! A recorded snapshot of everything a scan needs (spot, listed
//! expirations, chains, daily closes, rate series and broker marks),
//! served through the same ports as the live vendors. Used for offline
//! runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{
    ContractId, LookbackPeriod, OptionChain, OptionContract, OptionType, PricePoint, ScanError,
    ScanResult,
};

use super::ports::{MarketDataPort, QuoteProvider, RiskFreeRateProvider};
use super::session::{Broker, BrokerSession, Credentials};

/// Recorded market state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureData {
    /// Date the snapshot was recorded; scans over it should evaluate as of this day
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Rate series id -> latest value in percentage points
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
    /// Ticker -> recorded data
    #[serde(default)]
    pub tickers: BTreeMap<String, TickerFixture>,
}

/// Recorded data for one underlying
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerFixture {
    pub spot: f64,
    #[serde(default)]
    pub expirations: Vec<NaiveDate>,
    #[serde(default)]
    pub chains: BTreeMap<NaiveDate, OptionChain>,
    /// Daily closes, oldest first
    #[serde(default)]
    pub history: Vec<PricePoint>,
    #[serde(default)]
    pub quotes: Vec<QuoteFixture>,
}

/// Recorded broker mark for one contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteFixture {
    pub expiration: NaiveDate,
    pub strike: f64,
    #[serde(rename = "type", default)]
    pub option_type: OptionType,
    pub price: f64,
}

/// Fixture-backed market, rate source and broker
#[derive(Debug, Clone)]
pub struct FixtureMarket {
    data: Arc<FixtureData>,
    marks: Arc<HashMap<ContractId, f64>>,
}

impl FixtureMarket {
    pub fn new(data: FixtureData) -> Self {
        let marks = data
            .tickers
            .iter()
            .flat_map(|(ticker, t)| {
                t.quotes.iter().map(move |q| {
                    let contract =
                        OptionContract::new(ticker.clone(), q.expiration, q.strike, q.option_type);
                    (contract_id(&contract), q.price)
                })
            })
            .collect();

        Self {
            data: Arc::new(data),
            marks: Arc::new(marks),
        }
    }

    pub fn from_json(json: &str) -> ScanResult<Self> {
        let data: FixtureData = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ScanResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        tracing::info!("Loaded market fixture from {:?}", path.as_ref());
        Self::from_json(&json)
    }

    pub fn data(&self) -> &FixtureData {
        &self.data
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.data.as_of
    }

    fn ticker(&self, ticker: &str) -> ScanResult<&TickerFixture> {
        self.data
            .tickers
            .get(ticker)
            .ok_or_else(|| ScanError::provider(format!("fixture has no data for {}", ticker)))
    }
}

/// Stable id for a fixture contract
fn contract_id(contract: &OptionContract) -> ContractId {
    ContractId::new(format!(
        "{}:{}:{:.4}:{}",
        contract.ticker, contract.expiration, contract.strike, contract.option_type
    ))
}

impl MarketDataPort for FixtureMarket {
    fn spot_price(&self, ticker: &str) -> ScanResult<f64> {
        Ok(self.ticker(ticker)?.spot)
    }

    fn listed_expirations(&self, ticker: &str) -> ScanResult<Vec<NaiveDate>> {
        Ok(self.ticker(ticker)?.expirations.clone())
    }

    fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> ScanResult<Option<OptionChain>> {
        Ok(self.ticker(ticker)?.chains.get(&expiration).cloned())
    }

    /// The most recent `trading_days + 1` closes
    fn price_history(&self, ticker: &str, period: LookbackPeriod) -> ScanResult<Vec<PricePoint>> {
        let history = &self.ticker(ticker)?.history;
        let keep = period.trading_days() + 1;
        let start = history.len().saturating_sub(keep);
        Ok(history[start..].to_vec())
    }
}

impl RiskFreeRateProvider for FixtureMarket {
    fn latest_rate(&self, series_id: &str) -> ScanResult<Option<f64>> {
        Ok(self.data.rates.get(series_id).copied())
    }
}

impl QuoteProvider for FixtureMarket {
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>> {
        let id = contract_id(contract);
        Ok(self.marks.contains_key(&id).then_some(id))
    }

    fn market_price(&self, id: &ContractId) -> ScanResult<f64> {
        self.marks
            .get(id)
            .copied()
            .ok_or_else(|| ScanError::data(format!("unknown fixture contract {}", id)))
    }
}

impl BrokerSession for FixtureMarket {
    fn close(&mut self) -> ScanResult<()> {
        Ok(())
    }
}

impl Broker for FixtureMarket {
    type Session = FixtureMarket;

    fn open(&self, _credentials: &Credentials) -> ScanResult<FixtureMarket> {
        Ok(self.clone())
    }
}
