//! Shared blocking HTTP plumbing for vendor adapters
//!
//! A 401/403 only means "login failed" when it comes from a broker session.
//! Public data endpoints (quotes, history, rates) report it as an ordinary
//! provider failure so the scan can skip the affected ticker.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::core::{ScanError, ScanResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// How a rejected (401/403) request is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Broker session is not (or no longer) authenticated
    Session,
    /// Public endpoint refused the request
    Provider,
}

/// Client with a hard per-request timeout
pub fn build_client(timeout: Duration) -> ScanResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ScanError::provider(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` from a public data endpoint and decode the JSON body
pub fn get_public_json<T: DeserializeOwned>(client: &Client, url: &str) -> ScanResult<T> {
    decode(send_checked(client.get(url), url, Rejection::Provider)?, url)
}

/// GET `url` within a broker session and decode the JSON body
pub fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> ScanResult<T> {
    send_json(client.get(url), url)
}

/// Send a prepared broker request and decode the JSON body
pub fn send_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> ScanResult<T> {
    decode(send_checked(request, url, Rejection::Session)?, url)
}

/// Send a prepared broker request, ignoring any body
pub fn send_empty(request: RequestBuilder, url: &str) -> ScanResult<()> {
    send_checked(request, url, Rejection::Session).map(|_| ())
}

fn decode<T: DeserializeOwned>(response: Response, url: &str) -> ScanResult<T> {
    response
        .json()
        .map_err(|e| ScanError::data(format!("Failed to parse response from {}: {}", url, e)))
}

fn send_checked(request: RequestBuilder, url: &str, rejection: Rejection) -> ScanResult<Response> {
    tracing::debug!(url, "HTTP request");

    let response = request
        .send()
        .map_err(|e| ScanError::provider(format!("{}: {}", url, e)))?;

    check_status(response.status(), url, rejection)?;
    Ok(response)
}

/// Map a non-success status to the matching error
pub fn check_status(status: StatusCode, url: &str, rejection: Rejection) -> ScanResult<()> {
    let rejected = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
    if rejected && rejection == Rejection::Session {
        return Err(ScanError::Authentication(format!("{} returned {}", url, status)));
    }
    if !status.is_success() {
        return Err(ScanError::provider(format!("{} returned {}", url, status)));
    }
    Ok(())
}
