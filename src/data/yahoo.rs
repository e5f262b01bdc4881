//! Yahoo Finance market data
//!
//! Spot quotes, option expirations, option chains and daily closes from
//! Yahoo Finance's unofficial API.
//!
//! Note: Yahoo Finance data is delayed ~15 minutes and intended for
//! personal use.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::core::{LookbackPeriod, OptionChain, PricePoint, ScanError, ScanResult};

use super::http::{build_client, get_public_json};
use super::ports::MarketDataPort;

const QUOTE_BASE: &str = "https://query1.finance.yahoo.com/v7/finance";
const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance";

/// Yahoo Finance API client
pub struct YahooClient {
    client: reqwest::blocking::Client,
    quote_base: String,
    chart_base: String,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> ScanResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            quote_base: QUOTE_BASE.to_string(),
            chart_base: CHART_BASE.to_string(),
        })
    }

    /// Point both endpoints at another host (proxies, recorded responses)
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.quote_base = base.clone();
        self.chart_base = base;
        self
    }

    fn fetch_options(&self, symbol: &str, expiry: Option<NaiveDate>) -> ScanResult<YahooOptionChainData> {
        let url = match expiry {
            Some(date) => format!(
                "{}/options/{}?date={}",
                self.quote_base,
                symbol,
                expiry_timestamp(date)
            ),
            None => format!("{}/options/{}", self.quote_base, symbol),
        };

        let response: YahooOptionsResponse = get_public_json(&self.client, &url)?;
        first_chain(response)
    }
}

impl MarketDataPort for YahooClient {
    fn spot_price(&self, ticker: &str) -> ScanResult<f64> {
        let url = format!("{}/quote?symbols={}", self.quote_base, ticker);
        let response: YahooQuoteResponse = get_public_json(&self.client, &url)?;
        parse_spot(response)
    }

    fn listed_expirations(&self, ticker: &str) -> ScanResult<Vec<NaiveDate>> {
        let chain = self.fetch_options(ticker, None)?;
        Ok(expirations_from(&chain))
    }

    fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> ScanResult<Option<OptionChain>> {
        let chain = self.fetch_options(ticker, Some(expiration))?;
        Ok(chain_for(&chain, expiration))
    }

    fn price_history(&self, ticker: &str, period: LookbackPeriod) -> ScanResult<Vec<PricePoint>> {
        let url = format!(
            "{}/chart/{}?range={}&interval=1d",
            self.chart_base,
            ticker,
            period.as_range()
        );
        let response: YahooChartResponse = get_public_json(&self.client, &url)?;
        parse_history(response)
    }
}

/// Yahoo keys expirations by midnight UTC
fn expiry_timestamp(expiry: NaiveDate) -> i64 {
    expiry.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn to_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn parse_spot(response: YahooQuoteResponse) -> ScanResult<f64> {
    response
        .quote_response
        .result
        .into_iter()
        .next()
        .and_then(|q| q.regular_market_price)
        .ok_or_else(|| ScanError::data("No quote data returned"))
}

fn first_chain(response: YahooOptionsResponse) -> ScanResult<YahooOptionChainData> {
    response
        .option_chain
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::data("No options data returned"))
}

fn expirations_from(chain: &YahooOptionChainData) -> Vec<NaiveDate> {
    chain
        .expiration_dates
        .iter()
        .filter_map(|&ts| to_date(ts))
        .collect()
}

/// Strikes for `expiration`; Yahoo falls back to the nearest listed date
/// when asked for an unlisted one, which counts as no chain here.
fn chain_for(chain: &YahooOptionChainData, expiration: NaiveDate) -> Option<OptionChain> {
    let options = chain.options.first()?;
    if let Some(listed) = options.expiration_date.and_then(to_date) {
        if listed != expiration {
            return None;
        }
    }

    let strikes = |contracts: &[YahooOptionData]| -> Vec<f64> {
        contracts.iter().filter_map(|c| c.strike).collect()
    };
    let chain = OptionChain::new(strikes(&options.calls), strikes(&options.puts));

    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

fn parse_history(response: YahooChartResponse) -> ScanResult<Vec<PricePoint>> {
    if let Some(err) = response.chart.error {
        return Err(ScanError::data(format!(
            "chart error: {}",
            err.description.unwrap_or(err.code)
        )));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ScanError::data("No chart data returned"))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    // Missing sessions come back as null closes
    Ok(result
        .timestamp
        .unwrap_or_default()
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| Some(PricePoint::new(to_date(ts)?, close?)))
        .collect())
}

// Yahoo Finance API response structures

#[derive(Debug, Deserialize)]
struct YahooQuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteResult,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResult {
    result: Vec<YahooQuoteData>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteData {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChain,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChain {
    result: Vec<YahooOptionChainData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChainData {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<YahooOptions>,
}

#[derive(Debug, Deserialize)]
struct YahooOptions {
    #[serde(rename = "expirationDate")]
    expiration_date: Option<i64>,
    #[serde(default)]
    calls: Vec<YahooOptionData>,
    #[serde(default)]
    puts: Vec<YahooOptionData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionData {
    strike: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
    error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
