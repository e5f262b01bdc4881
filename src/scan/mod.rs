//! Market scan
//!
//! Single sequential pass over ticker -> expiration -> strike:
//!
//! 1. Resolve the risk-free rate once. Failure aborts the scan.
//! 2. For each ticker, list the viable expirations.
//! 3. For each expiration, filter strikes and build a fresh snapshot
//!    (spot and volatility are fetched again for every expiration).
//! 4. For each strike, price the option and look up the broker mark.
//!
//! Errors local to a ticker, expiration or strike skip that item and are
//! recorded in the report; everything else aborts.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::core::{
    ComparisonRecord, MarketSnapshot, OptionContract, ScanError, ScanRequest, ScanResult,
};
use crate::data::{MarketDataPort, QuoteProvider, RiskFreeRateProvider};
use crate::estimation::{risk_free_rate, ParameterEstimator};
use crate::models::{price_snapshot, DegeneratePolicy};

/// An item left out of the report and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub ticker: String,
    pub expiration: Option<NaiveDate>,
    pub strike: Option<f64>,
    pub reason: String,
}

/// Outcome of a completed scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// Evaluation date
    pub as_of: NaiveDate,
    /// Risk-free rate used for every valuation (decimal)
    pub rate: f64,
    /// One row per priced contract, in ticker -> expiration -> strike order
    pub records: Vec<ComparisonRecord>,
    pub skipped: Vec<SkippedItem>,
}

impl ScanReport {
    fn new(as_of: NaiveDate, rate: f64) -> Self {
        Self {
            as_of,
            rate,
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(
        &mut self,
        ticker: &str,
        expiration: Option<NaiveDate>,
        strike: Option<f64>,
        err: &ScanError,
    ) {
        warn!(
            ticker,
            expiration = ?expiration,
            strike = ?strike,
            "Skipping: {}",
            err
        );
        self.skipped.push(SkippedItem {
            ticker: ticker.to_string(),
            expiration,
            strike,
            reason: err.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Drives a scan over the three collaborator ports
pub struct Scanner<'a> {
    market: &'a dyn MarketDataPort,
    rates: &'a dyn RiskFreeRateProvider,
    quotes: &'a dyn QuoteProvider,
    policy: DegeneratePolicy,
    as_of: Option<NaiveDate>,
}

impl<'a> Scanner<'a> {
    pub fn new(
        market: &'a dyn MarketDataPort,
        rates: &'a dyn RiskFreeRateProvider,
        quotes: &'a dyn QuoteProvider,
    ) -> Self {
        Self {
            market,
            rates,
            quotes,
            policy: DegeneratePolicy::default(),
            as_of: None,
        }
    }

    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate as of a fixed date instead of today (UTC)
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Run the full sweep described by `request`
    pub fn run(&self, request: &ScanRequest) -> ScanResult<ScanReport> {
        request.validate()?;

        let rate = risk_free_rate(self.rates, &request.rate_series)?;
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let estimator = ParameterEstimator::as_of(self.market, as_of);

        info!(
            tickers = request.tickers.len(),
            %as_of,
            rate,
            series = %request.rate_series,
            option_type = %request.option_type,
            "Starting scan"
        );

        let mut report = ScanReport::new(as_of, rate);
        for ticker in &request.tickers {
            let _span = info_span!("ticker", %ticker).entered();
            self.scan_ticker(&estimator, ticker, request, rate, &mut report)?;
        }

        info!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            "Scan complete"
        );
        Ok(report)
    }

    fn scan_ticker(
        &self,
        estimator: &ParameterEstimator<'_>,
        ticker: &str,
        request: &ScanRequest,
        rate: f64,
        report: &mut ScanReport,
    ) -> ScanResult<()> {
        let expirations = match estimator.viable_expirations(ticker, request.horizon_months) {
            Ok(expirations) => expirations,
            Err(e) if e.is_local() => {
                report.skip(ticker, None, None, &e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(ticker, expirations = expirations.len(), "Viable expirations");

        for expiration in expirations {
            match self.scan_expiration(estimator, ticker, expiration, request, rate, report) {
                Ok(()) => {}
                Err(e) if e.is_local() => report.skip(ticker, Some(expiration), None, &e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn scan_expiration(
        &self,
        estimator: &ParameterEstimator<'_>,
        ticker: &str,
        expiration: NaiveDate,
        request: &ScanRequest,
        rate: f64,
        report: &mut ScanReport,
    ) -> ScanResult<()> {
        let strikes = estimator.viable_strikes(ticker, expiration, request.band_percent)?;
        if strikes.is_empty() {
            debug!(ticker, %expiration, "No strikes inside the band");
            return Ok(());
        }

        let snapshot = self.snapshot(estimator, ticker, expiration, request, rate)?;
        if snapshot.is_degenerate() && self.policy == DegeneratePolicy::FailFast {
            return Err(ScanError::degenerate(format!(
                "volatility {} and time to maturity {} leave the model undefined",
                snapshot.volatility, snapshot.time_to_maturity
            )));
        }

        debug!(
            ticker,
            %expiration,
            strikes = strikes.len(),
            spot = snapshot.spot,
            volatility = snapshot.volatility,
            time_to_maturity = snapshot.time_to_maturity,
            "Pricing expiration"
        );

        for strike in strikes {
            let contract = OptionContract::new(ticker, expiration, strike, request.option_type);
            match self.compare(&contract, &snapshot) {
                Ok(record) => report.records.push(record),
                Err(e) if e.is_local() => report.skip(ticker, Some(expiration), Some(strike), &e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fresh spot, volatility and maturity for one expiration
    fn snapshot(
        &self,
        estimator: &ParameterEstimator<'_>,
        ticker: &str,
        expiration: NaiveDate,
        request: &ScanRequest,
        rate: f64,
    ) -> ScanResult<MarketSnapshot> {
        let spot = estimator.spot_price(ticker)?;
        let volatility = estimator.historical_volatility(ticker, request.lookback)?;
        let time_to_maturity = estimator.time_to_maturity(expiration);
        MarketSnapshot::new(spot, rate, volatility, time_to_maturity)
    }

    fn compare(
        &self,
        contract: &OptionContract,
        snapshot: &MarketSnapshot,
    ) -> ScanResult<ComparisonRecord> {
        let model_price = price_snapshot(snapshot, contract.strike, contract.option_type, self.policy)?;

        let market_price = match self.quotes.find_contract(contract)? {
            Some(id) => Some(self.quotes.market_price(&id)?),
            None => {
                debug!(%contract, "No listed contract at broker");
                None
            }
        };

        Ok(ComparisonRecord {
            ticker: contract.ticker.clone(),
            expiration: contract.expiration,
            strike: contract.strike,
            option_type: contract.option_type,
            model_price: Some(model_price),
            market_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContractId, LookbackPeriod, OptionChain, PricePoint};
    use chrono::Duration;
    use std::cell::Cell;

    struct CountingMarket {
        spot_calls: Cell<u32>,
        history_calls: Cell<u32>,
        today: NaiveDate,
    }

    impl MarketDataPort for CountingMarket {
        fn spot_price(&self, _ticker: &str) -> ScanResult<f64> {
            self.spot_calls.set(self.spot_calls.get() + 1);
            Ok(100.0)
        }

        fn listed_expirations(&self, _ticker: &str) -> ScanResult<Vec<NaiveDate>> {
            Ok(vec![
                self.today + Duration::days(30),
                self.today + Duration::days(60),
                self.today + Duration::days(90),
            ])
        }

        fn option_chain(&self, _ticker: &str, _expiration: NaiveDate) -> ScanResult<Option<OptionChain>> {
            Ok(Some(OptionChain::new(vec![100.0, 95.0, 105.0], vec![90.0])))
        }

        fn price_history(&self, _ticker: &str, _period: LookbackPeriod) -> ScanResult<Vec<PricePoint>> {
            self.history_calls.set(self.history_calls.get() + 1);
            Ok([100.0, 102.0, 99.0, 101.0]
                .iter()
                .enumerate()
                .map(|(i, c)| PricePoint::new(self.today - Duration::days(4 - i as i64), *c))
                .collect())
        }
    }

    struct Rate;

    impl RiskFreeRateProvider for Rate {
        fn latest_rate(&self, _series_id: &str) -> ScanResult<Option<f64>> {
            Ok(Some(4.0))
        }
    }

    struct NoQuotes;

    impl QuoteProvider for NoQuotes {
        fn find_contract(&self, _contract: &OptionContract) -> ScanResult<Option<ContractId>> {
            Ok(None)
        }

        fn market_price(&self, _id: &ContractId) -> ScanResult<f64> {
            Err(ScanError::data("unreachable"))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_refetches_spot_and_vol_per_expiration() {
        let market = CountingMarket {
            spot_calls: Cell::new(0),
            history_calls: Cell::new(0),
            today: today(),
        };
        let scanner = Scanner::new(&market, &Rate, &NoQuotes).with_as_of(today());
        let report = scanner.run(&ScanRequest::new(["AAPL"])).unwrap();

        // 3 expirations x strikes {90, 95, 100, 105}
        assert_eq!(report.records.len(), 12);
        // One spot for the strike filter and one for the snapshot, per expiration
        assert_eq!(market.spot_calls.get(), 6);
        assert_eq!(market.history_calls.get(), 3);
        assert!((report.rate - 0.04).abs() < 1e-15);
    }

    #[test]
    fn test_emission_order() {
        let market = CountingMarket {
            spot_calls: Cell::new(0),
            history_calls: Cell::new(0),
            today: today(),
        };
        let scanner = Scanner::new(&market, &Rate, &NoQuotes).with_as_of(today());
        let report = scanner.run(&ScanRequest::new(["AAPL", "MSFT"])).unwrap();

        let keys: Vec<(String, NaiveDate, f64)> = report
            .records
            .iter()
            .map(|r| (r.ticker.clone(), r.expiration, r.strike))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_by(|a, b| {
            (a.0.as_str(), a.1)
                .cmp(&(b.0.as_str(), b.1))
                .then(a.2.total_cmp(&b.2))
        });
        assert_eq!(keys, sorted);
        assert_eq!(report.records.first().unwrap().strike, 90.0);
        assert!(report.records.iter().all(|r| r.market_price.is_none()));
        assert!(report.records.iter().all(|r| r.model_price.is_some()));
    }
}
