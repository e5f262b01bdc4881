//! Scan configuration
//!
//! Loaded from an optional TOML file, then environment variables, then CLI
//! flags. Later sources override earlier ones.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::core::{LookbackPeriod, OptionType, ScanRequest, DEFAULT_RATE_SERIES};
use crate::data::{CacheConfig, Credentials};
use crate::models::DegeneratePolicy;
use crate::report::OutputFormat;

/// Prefix for scan settings read from the environment
pub const ENV_PREFIX: &str = "OPTION_SCAN_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No tickers configured")]
    NoTickers,

    #[error("Invalid horizon: {0}. Must be at least one month")]
    InvalidHorizon(u32),

    #[error("Invalid strike band: {0}. Must be within (0, 100) percent")]
    InvalidBand(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid broker: {0}. Must be one of: robinhood, ibkr, fixture")]
    InvalidBroker(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing setting: {0}")]
    Missing(String),

    #[error("Configuration file error: {0}")]
    FileError(String),
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive for tracing-subscriber
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LogLevel::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of live option marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Robinhood,
    Ibkr,
    /// Recorded JSON snapshot; also replaces Yahoo and FRED
    Fixture,
}

impl FromStr for BrokerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "robinhood" | "rh" => Ok(BrokerKind::Robinhood),
            "ibkr" | "ib" => Ok(BrokerKind::Ibkr),
            "fixture" => Ok(BrokerKind::Fixture),
            _ => Err(ConfigError::InvalidBroker(s.to_string())),
        }
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerKind::Robinhood => f.write_str("robinhood"),
            BrokerKind::Ibkr => f.write_str("ibkr"),
            BrokerKind::Fixture => f.write_str("fixture"),
        }
    }
}

/// Broker connection settings
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Robinhood device token, reused across logins when set
    pub device_token: Option<String>,
    /// Client Portal gateway base URL override
    pub gateway_url: Option<String>,
    /// Market snapshot used by the fixture broker
    pub fixture: Option<PathBuf>,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("device_token", &self.device_token.as_ref().map(|_| "<redacted>"))
            .field("gateway_url", &self.gateway_url)
            .field("fixture", &self.fixture)
            .finish()
    }
}

impl BrokerConfig {
    /// Login credentials; Robinhood is the only broker that needs them
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        match self.kind {
            BrokerKind::Robinhood => {
                let username = self
                    .username
                    .clone()
                    .ok_or_else(|| ConfigError::Missing("broker username (ROBINHOOD_USERNAME)".into()))?;
                let password = self
                    .password
                    .clone()
                    .ok_or_else(|| ConfigError::Missing("broker password (ROBINHOOD_PASSWORD)".into()))?;
                Ok(Credentials::new(username, password))
            }
            BrokerKind::Ibkr | BrokerKind::Fixture => {
                Ok(Credentials::new(self.username.clone().unwrap_or_default(), ""))
            }
        }
    }
}

/// Full configuration for one scan run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub tickers: Vec<String>,
    pub horizon_months: u32,
    pub band_percent: f64,
    pub option_type: OptionType,
    pub lookback: LookbackPeriod,
    pub rate_series: String,
    pub degenerate_policy: DegeneratePolicy,
    pub format: OutputFormat,
    /// HTTP request timeout for every vendor adapter
    pub timeout_secs: u64,
    pub log_level: LogLevel,
    pub fred_api_key: Option<String>,
    pub broker: BrokerConfig,
    pub cache: CacheConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            horizon_months: 6,
            band_percent: 10.0,
            option_type: OptionType::Call,
            lookback: LookbackPeriod::OneYear,
            rate_series: DEFAULT_RATE_SERIES.to_string(),
            degenerate_policy: DegeneratePolicy::FailFast,
            format: OutputFormat::Table,
            timeout_secs: 10,
            log_level: LogLevel::Info,
            fred_api_key: None,
            broker: BrokerConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn split_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ScanConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))
    }

    /// Override from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override from any key lookup (the environment in production)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(raw) = var("TICKERS") {
            self.tickers = split_tickers(&raw);
        }
        if let Some(raw) = var("HORIZON_MONTHS") {
            self.horizon_months = parse_value("HORIZON_MONTHS", &raw)?;
        }
        if let Some(raw) = var("BAND_PERCENT") {
            self.band_percent = parse_value("BAND_PERCENT", &raw)?;
        }
        if let Some(raw) = var("OPTION_TYPE") {
            self.option_type = parse_value("OPTION_TYPE", &raw)?;
        }
        if let Some(raw) = var("LOOKBACK") {
            self.lookback = parse_value("LOOKBACK", &raw)?;
        }
        if let Some(raw) = var("RATE_SERIES") {
            self.rate_series = raw.trim().to_string();
        }
        if let Some(raw) = var("DEGENERATE_POLICY") {
            self.degenerate_policy = parse_value("DEGENERATE_POLICY", &raw)?;
        }
        if let Some(raw) = var("TIMEOUT_SECS") {
            self.timeout_secs = parse_value("TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = var("LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&raw)?;
        }
        if let Some(raw) = var("BROKER") {
            self.broker.kind = BrokerKind::from_str(&raw)?;
        }

        if let Some(key) = lookup("FRED_API_KEY") {
            self.fred_api_key = Some(key);
        }
        if let Some(user) = lookup("ROBINHOOD_USERNAME") {
            self.broker.username = Some(user);
        }
        if let Some(password) = lookup("ROBINHOOD_PASSWORD") {
            self.broker.password = Some(password);
        }
        if let Some(token) = lookup("ROBINHOOD_DEVICE_TOKEN") {
            self.broker.device_token = Some(token);
        }
        Ok(())
    }

    /// Merge CLI overrides (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliOverrides) {
        if !cli.tickers.is_empty() {
            self.tickers = cli.tickers.iter().flat_map(|t| split_tickers(t)).collect();
        }
        if let Some(months) = cli.horizon_months {
            self.horizon_months = months;
        }
        if let Some(band) = cli.band_percent {
            self.band_percent = band;
        }
        if let Some(option_type) = cli.option_type {
            self.option_type = option_type;
        }
        if let Some(lookback) = cli.lookback {
            self.lookback = lookback;
        }
        if let Some(series) = &cli.rate_series {
            self.rate_series = series.clone();
        }
        if let Some(policy) = cli.degenerate_policy {
            self.degenerate_policy = policy;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if let Some(kind) = cli.broker {
            self.broker.kind = kind;
        }
        if let Some(path) = &cli.fixture {
            self.broker.fixture = Some(path.clone());
        }
        if cli.no_cache {
            self.cache.enabled = false;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tickers.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::NoTickers);
        }
        if self.horizon_months == 0 {
            return Err(ConfigError::InvalidHorizon(self.horizon_months));
        }
        if !(self.band_percent > 0.0 && self.band_percent < 100.0) {
            return Err(ConfigError::InvalidBand(self.band_percent));
        }
        if self.rate_series.trim().is_empty() {
            return Err(ConfigError::Missing("rate series id".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".into(),
                message: "must be positive".into(),
            });
        }
        if self.broker.kind == BrokerKind::Fixture && self.broker.fixture.is_none() {
            return Err(ConfigError::Missing("fixture file for the fixture broker".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Immutable sweep definition for the scanner
    pub fn to_request(&self) -> ScanRequest {
        ScanRequest::new(self.tickers.iter().cloned())
            .with_horizon_months(self.horizon_months)
            .with_band_percent(self.band_percent)
            .with_option_type(self.option_type)
            .with_lookback(self.lookback)
            .with_rate_series(self.rate_series.clone())
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub tickers: Vec<String>,
    pub horizon_months: Option<u32>,
    pub band_percent: Option<f64>,
    pub option_type: Option<OptionType>,
    pub lookback: Option<LookbackPeriod>,
    pub rate_series: Option<String>,
    pub degenerate_policy: Option<DegeneratePolicy>,
    pub format: Option<OutputFormat>,
    pub log_level: Option<LogLevel>,
    pub broker: Option<BrokerKind>,
    pub fixture: Option<PathBuf>,
    pub no_cache: bool,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliOverrides) -> Result<ScanConfig, ConfigError> {
    let mut config = match &cli.config_file {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };

    config.apply_env()?;
    config.merge_with_cli(cli);
    config.validate()?;

    Ok(config)
}
