//! Interactive Brokers quotes through the Client Portal gateway
//!
//! The gateway runs locally and is authenticated in a browser, so opening a
//! session only verifies that the gateway reports an authenticated
//! brokerage session. Closing logs the gateway out.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::core::{ContractId, OptionContract, ScanError, ScanResult};

use super::http::{get_json, send_empty, send_json};
use super::ports::QuoteProvider;
use super::session::{Broker, BrokerSession, Credentials};

const GATEWAY_BASE: &str = "https://localhost:5000/v1/api";

/// Snapshot field id for the last traded price
const LAST_PRICE_FIELD: &str = "31";

/// The first snapshot for a conid only subscribes; data arrives on the next one
const SNAPSHOT_SETTLE: Duration = Duration::from_millis(500);

pub struct IbkrBroker {
    client: Client,
    base_url: String,
}

impl IbkrBroker {
    /// Gateway client; the local gateway serves a self-signed certificate
    pub fn new(timeout: Duration) -> ScanResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ScanError::provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: GATEWAY_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl Broker for IbkrBroker {
    type Session = IbkrSession;

    fn open(&self, _credentials: &Credentials) -> ScanResult<IbkrSession> {
        let url = format!("{}/iserver/auth/status", self.base_url);
        let status: AuthStatus = send_json(self.client.post(&url), &url)?;

        if !status.authenticated {
            return Err(ScanError::Authentication(
                status
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "gateway session is not authenticated".to_string()),
            ));
        }

        tracing::info!(connected = status.connected, "IBKR gateway session ready");
        Ok(IbkrSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            closed: false,
        })
    }
}

/// Authenticated gateway session
pub struct IbkrSession {
    client: Client,
    base_url: String,
    closed: bool,
}

impl IbkrSession {
    fn underlying_conid(&self, ticker: &str) -> ScanResult<Option<i64>> {
        let url = format!(
            "{}/iserver/secdef/search?symbol={}&secType=STK",
            self.base_url, ticker
        );
        let results: Vec<SecdefSearchResult> = get_json(&self.client, &url)?;
        Ok(results
            .into_iter()
            .find(|r| r.symbol.eq_ignore_ascii_case(ticker))
            .and_then(|r| r.conid))
    }

    fn snapshot(&self, id: &ContractId) -> ScanResult<Option<f64>> {
        let url = format!(
            "{}/iserver/marketdata/snapshot?conids={}&fields={}",
            self.base_url, id, LAST_PRICE_FIELD
        );
        let rows: Vec<serde_json::Value> = get_json(&self.client, &url)?;
        Ok(rows.first().and_then(last_price))
    }
}

impl QuoteProvider for IbkrSession {
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>> {
        let Some(conid) = self.underlying_conid(&contract.ticker)? else {
            return Ok(None);
        };

        let url = format!(
            "{}/iserver/secdef/info?conid={}&sectype=OPT&month={}&strike={}&right={}",
            self.base_url,
            conid,
            contract_month(contract),
            contract.strike,
            contract.option_type.right()
        );
        let infos: Vec<SecdefInfo> = get_json(&self.client, &url)?;
        Ok(match_maturity(&infos, contract))
    }

    fn market_price(&self, id: &ContractId) -> ScanResult<f64> {
        if let Some(price) = self.snapshot(id)? {
            return Ok(price);
        }
        thread::sleep(SNAPSHOT_SETTLE);
        self.snapshot(id)?
            .ok_or_else(|| ScanError::data(format!("no last price for conid {}", id)))
    }
}

impl BrokerSession for IbkrSession {
    fn close(&mut self) -> ScanResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let url = format!("{}/logout", self.base_url);
        send_empty(self.client.post(&url), &url)?;
        tracing::info!("Logged out of IBKR gateway");
        Ok(())
    }
}

/// Gateway month code, e.g. "DEC26"
fn contract_month(contract: &OptionContract) -> String {
    contract.expiration.format("%b%y").to_string().to_uppercase()
}

fn match_maturity(infos: &[SecdefInfo], contract: &OptionContract) -> Option<ContractId> {
    let maturity = contract.expiration.format("%Y%m%d").to_string();
    infos
        .iter()
        .find(|i| i.maturity_date.as_deref() == Some(maturity.as_str()))
        .map(|i| ContractId::new(i.conid.to_string()))
}

/// Field 31 is a string, optionally prefixed with "C" (prior close) or "H" (halted)
fn last_price(row: &serde_json::Value) -> Option<f64> {
    let raw = row.get(LAST_PRICE_FIELD)?.as_str()?;
    raw.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .replace(',', "")
        .parse()
        .ok()
}

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    connected: bool,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecdefSearchResult {
    #[serde(default, deserialize_with = "conid_from_any")]
    conid: Option<i64>,
    #[serde(default)]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct SecdefInfo {
    conid: i64,
    #[serde(rename = "maturityDate")]
    maturity_date: Option<String>,
}

/// Search results report conid as a string, other endpoints as a number
fn conid_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
