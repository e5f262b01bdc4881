//! Local data caching
//!
//! Caches slow-moving market data (listed expirations, option chains,
//! daily closes) on disk to reduce API calls during repeated scans. Spot
//! prices always go to the live source.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{LookbackPeriod, OptionChain, PricePoint, ScanResult};

use super::ports::MarketDataPort;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory
    pub cache_dir: PathBuf,
    /// Maximum age before refresh (in hours)
    pub max_age_hours: i64,
    /// Whether to use cache
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./data/cache"),
            max_age_hours: 24,
            enabled: false,
        }
    }
}

/// Data cache manager
pub struct DataCache {
    config: CacheConfig,
}

impl DataCache {
    pub fn new(config: CacheConfig) -> ScanResult<Self> {
        if config.enabled && !config.cache_dir.exists() {
            fs::create_dir_all(&config.cache_dir)?;
        }

        Ok(Self { config })
    }

    /// Cache key for a symbol and data type
    fn cache_key(&self, symbol: &str, data_type: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}_{}.json", symbol, data_type))
    }

    /// Check if cache is valid (exists and not expired)
    pub fn is_valid(&self, symbol: &str, data_type: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let path = self.cache_key(symbol, data_type);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };

        let modified: DateTime<Utc> = modified.into();
        Utc::now() - modified < Duration::hours(self.config.max_age_hours)
    }

    /// Save a value to cache
    pub fn save<T: Serialize>(&self, symbol: &str, data_type: &str, value: &T) -> ScanResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let path = self.cache_key(symbol, data_type);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;

        tracing::debug!("Cached {} for {} at {:?}", data_type, symbol, path);
        Ok(())
    }

    /// Load a value from cache if present and fresh
    pub fn load<T: DeserializeOwned>(&self, symbol: &str, data_type: &str) -> ScanResult<Option<T>> {
        if !self.is_valid(symbol, data_type) {
            return Ok(None);
        }

        let path = self.cache_key(symbol, data_type);
        let json = fs::read_to_string(&path)?;
        let value: T = serde_json::from_str(&json)?;

        tracing::debug!("Loaded {} for {} from cache", data_type, symbol);
        Ok(Some(value))
    }

    /// Clear cache for a symbol
    pub fn clear(&self, symbol: &str) -> ScanResult<()> {
        if !self.config.cache_dir.exists() {
            return Ok(());
        }

        let prefix = format!("{}_", symbol);
        for entry in fs::read_dir(&self.config.cache_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();

            if file_name.starts_with(&prefix) {
                fs::remove_file(entry.path())?;
            }
        }

        Ok(())
    }
}

/// Market data source with an on-disk cache in front
pub struct CachedMarketData<P> {
    inner: P,
    cache: DataCache,
}

impl<P: MarketDataPort> CachedMarketData<P> {
    pub fn new(inner: P, config: CacheConfig) -> ScanResult<Self> {
        Ok(Self {
            inner,
            cache: DataCache::new(config)?,
        })
    }

    fn cached<T, F>(&self, symbol: &str, data_type: &str, fetch: F) -> ScanResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> ScanResult<T>,
    {
        match self.cache.load(symbol, data_type) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            // A corrupt entry is refetched and overwritten
            Err(e) => tracing::warn!("Ignoring cached {} for {}: {}", data_type, symbol, e),
        }

        let value = fetch()?;
        if let Err(e) = self.cache.save(symbol, data_type, &value) {
            tracing::warn!("Failed to cache {} for {}: {}", data_type, symbol, e);
        }
        Ok(value)
    }
}

impl<P: MarketDataPort> MarketDataPort for CachedMarketData<P> {
    fn spot_price(&self, ticker: &str) -> ScanResult<f64> {
        self.inner.spot_price(ticker)
    }

    fn listed_expirations(&self, ticker: &str) -> ScanResult<Vec<NaiveDate>> {
        self.cached(ticker, "expirations", || self.inner.listed_expirations(ticker))
    }

    fn option_chain(&self, ticker: &str, expiration: NaiveDate) -> ScanResult<Option<OptionChain>> {
        let data_type = format!("chain_{}", expiration.format("%Y%m%d"));
        match self.cache.load::<OptionChain>(ticker, &data_type) {
            Ok(Some(chain)) => return Ok(Some(chain)),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring cached {} for {}: {}", data_type, ticker, e),
        }

        // Missing chains are not cached
        let chain = self.inner.option_chain(ticker, expiration)?;
        if let Some(chain) = &chain {
            if let Err(e) = self.cache.save(ticker, &data_type, chain) {
                tracing::warn!("Failed to cache {} for {}: {}", data_type, ticker, e);
            }
        }
        Ok(chain)
    }

    fn price_history(&self, ticker: &str, period: LookbackPeriod) -> ScanResult<Vec<PricePoint>> {
        let data_type = format!("history_{}", period.as_range());
        self.cached(ticker, &data_type, || self.inner.price_history(ticker, period))
    }
}
