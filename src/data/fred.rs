//! FRED (Federal Reserve Economic Data) risk-free rates
//!
//! Treasury yields such as DGS10 are published in percentage points, one
//! observation per business day. Holidays appear as "." and are skipped.

use std::time::Duration;

use serde::Deserialize;

use crate::core::{ScanError, ScanResult};

use super::http::{build_client, get_public_json};
use super::ports::RiskFreeRateProvider;

const FRED_BASE: &str = "https://api.stlouisfed.org/fred";

/// Observations fetched per request; enough to step over holiday gaps
const LOOKBACK_OBSERVATIONS: usize = 10;

pub struct FredClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl FredClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> ScanResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScanError::invalid_input("FRED API key is empty"));
        }

        Ok(Self {
            client: build_client(timeout)?,
            base_url: FRED_BASE.to_string(),
            api_key,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl RiskFreeRateProvider for FredClient {
    fn latest_rate(&self, series_id: &str) -> ScanResult<Option<f64>> {
        let url = format!(
            "{}/series/observations?series_id={}&api_key={}&file_type=json&sort_order=desc&limit={}",
            self.base_url, series_id, self.api_key, LOOKBACK_OBSERVATIONS
        );

        let response: FredObservations = get_public_json(&self.client, &url)
            .map_err(|e| redact(e, &self.api_key))?;
        let latest = latest_value(&response);

        if let Some(value) = latest {
            tracing::info!(series = series_id, value, "Latest risk-free rate observation");
        }
        Ok(latest)
    }
}

/// Keep the API key out of error messages and logs
fn redact(err: ScanError, key: &str) -> ScanError {
    match err {
        ScanError::ProviderUnavailable(msg) => ScanError::ProviderUnavailable(msg.replace(key, "***")),
        ScanError::Data(msg) => ScanError::Data(msg.replace(key, "***")),
        other => other,
    }
}

/// First parseable value of a newest-first observation list
fn latest_value(response: &FredObservations) -> Option<f64> {
    response
        .observations
        .iter()
        .filter_map(|o| o.value.trim().parse::<f64>().ok())
        .find(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
struct FredObservations {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    value: String,
}
