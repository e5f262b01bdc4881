//! Robinhood option quotes
//!
//! Password-grant OAuth login, instrument lookup by chain symbol /
//! expiration / strike / type, and the adjusted mark price from option
//! market data. Closing the session revokes the access token.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::{ContractId, OptionContract, ScanError, ScanResult};

use super::http::{build_client, send_empty, send_json};
use super::ports::QuoteProvider;
use super::session::{Broker, BrokerSession, Credentials};

const ROBINHOOD_BASE: &str = "https://api.robinhood.com";

/// Public OAuth client id of the Robinhood web app
const CLIENT_ID: &str = "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS";

/// Token lifetime requested at login, in seconds
const TOKEN_EXPIRY_SECS: u64 = 86_400;

/// Strike equality tolerance when matching instruments
const STRIKE_TOLERANCE: f64 = 1e-4;

pub struct RobinhoodBroker {
    client: Client,
    base_url: String,
    device_token: Option<String>,
}

impl RobinhoodBroker {
    pub fn new(timeout: Duration) -> ScanResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: ROBINHOOD_BASE.to_string(),
            device_token: None,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// Device token of a previously approved device (skips the SMS challenge)
    pub fn with_device_token(mut self, token: impl Into<String>) -> Self {
        self.device_token = Some(token.into());
        self
    }
}

impl Broker for RobinhoodBroker {
    type Session = RobinhoodSession;

    fn open(&self, credentials: &Credentials) -> ScanResult<RobinhoodSession> {
        let url = format!("{}/oauth2/token/", self.base_url);
        let mut body = json!({
            "client_id": CLIENT_ID,
            "expires_in": TOKEN_EXPIRY_SECS,
            "grant_type": "password",
            "scope": "internal",
            "username": credentials.username,
            "password": credentials.password,
        });
        if let Some(token) = &self.device_token {
            body["device_token"] = json!(token);
        }

        let response: TokenResponse = send_json(self.client.post(&url).json(&body), &url)?;
        let access_token = response.access_token.ok_or_else(|| {
            ScanError::Authentication(
                response
                    .detail
                    .unwrap_or_else(|| "login did not return an access token".to_string()),
            )
        })?;

        tracing::info!(user = %credentials.username, "Logged in to Robinhood");
        Ok(RobinhoodSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            access_token,
            closed: false,
        })
    }
}

/// Authenticated Robinhood session
pub struct RobinhoodSession {
    client: Client,
    base_url: String,
    access_token: String,
    closed: bool,
}

impl QuoteProvider for RobinhoodSession {
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>> {
        let url = format!(
            "{}/options/instruments/?chain_symbol={}&expiration_dates={}&strike_price={:.4}&type={}&state=active",
            self.base_url,
            contract.ticker,
            contract.expiration.format("%Y-%m-%d"),
            contract.strike,
            contract.option_type.as_str()
        );

        let page: InstrumentPage =
            send_json(self.client.get(&url).bearer_auth(&self.access_token), &url)?;
        Ok(match_instrument(&page, contract))
    }

    fn market_price(&self, id: &ContractId) -> ScanResult<f64> {
        let url = format!("{}/marketdata/options/{}/", self.base_url, id);
        let data: OptionMarketData =
            send_json(self.client.get(&url).bearer_auth(&self.access_token), &url)?;
        data.mark()
            .ok_or_else(|| ScanError::data(format!("no mark price for option {}", id)))
    }
}

impl BrokerSession for RobinhoodSession {
    fn close(&mut self) -> ScanResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let url = format!("{}/oauth2/revoke_token/", self.base_url);
        let body = json!({ "client_id": CLIENT_ID, "token": self.access_token });
        send_empty(self.client.post(&url).json(&body), &url)?;

        tracing::info!("Logged out of Robinhood");
        Ok(())
    }
}

fn match_instrument(page: &InstrumentPage, contract: &OptionContract) -> Option<ContractId> {
    let expiration = contract.expiration.format("%Y-%m-%d").to_string();
    page.results
        .iter()
        .find(|i| {
            let strike_matches = i
                .strike_price
                .parse::<f64>()
                .map(|k| (k - contract.strike).abs() < STRIKE_TOLERANCE)
                .unwrap_or(false);
            strike_matches
                && i.expiration_date == expiration
                && i.option_type == contract.option_type.as_str()
        })
        .map(|i| ContractId::new(i.id.clone()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentPage {
    #[serde(default)]
    results: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    id: String,
    strike_price: String,
    expiration_date: String,
    #[serde(rename = "type")]
    option_type: String,
}

#[derive(Debug, Deserialize)]
struct OptionMarketData {
    adjusted_mark_price: Option<String>,
    mark_price: Option<String>,
}

impl OptionMarketData {
    /// Adjusted mark, falling back to the plain mark
    fn mark(&self) -> Option<f64> {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.parse::<f64>().ok());
        parse(&self.adjusted_mark_price).or_else(|| parse(&self.mark_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use chrono::NaiveDate;

    fn contract(strike: f64) -> OptionContract {
        OptionContract::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
            strike,
            OptionType::Call,
        )
    }

    const PAGE: &str = r#"{"next":null,"results":[
        {"id":"a1b2","chain_symbol":"AAPL","strike_price":"225.0000","expiration_date":"2026-12-18","type":"call","state":"active"},
        {"id":"c3d4","chain_symbol":"AAPL","strike_price":"230.0000","expiration_date":"2026-12-18","type":"call","state":"active"}
    ]}"#;

    #[test]
    fn test_match_instrument() {
        let page: InstrumentPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(match_instrument(&page, &contract(230.0)), Some(ContractId::new("c3d4")));
        assert_eq!(match_instrument(&page, &contract(232.5)), None);
    }

    #[test]
    fn test_match_respects_type() {
        let page: InstrumentPage = serde_json::from_str(PAGE).unwrap();
        let mut put = contract(225.0);
        put.option_type = OptionType::Put;
        assert_eq!(match_instrument(&page, &put), None);
    }

    #[test]
    fn test_mark_price() {
        let data: OptionMarketData = serde_json::from_str(
            r#"{"adjusted_mark_price":"3.450000","mark_price":"3.460000","ask_price":"3.50"}"#,
        )
        .unwrap();
        assert_eq!(data.mark(), Some(3.45));

        let fallback: OptionMarketData =
            serde_json::from_str(r#"{"adjusted_mark_price":null,"mark_price":"1.25"}"#).unwrap();
        assert_eq!(fallback.mark(), Some(1.25));
    }

    #[test]
    fn test_token_without_access_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"mfa_required":true,"detail":"Request blocked, challenge required."}"#)
                .unwrap();
        assert!(response.access_token.is_none());
        assert_eq!(response.detail.as_deref(), Some("Request blocked, challenge required."));
    }
}
