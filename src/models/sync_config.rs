use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BINANCE_BASE_URL, DEFAULT_CHUNK_SIZE, DEFAULT_COINS, DEFAULT_COIN_DELAY_MS,
    DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_LIMIT, DEFAULT_RATE_LIMIT_RETRIES,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::error::{AppError, Result};
use crate::models::coin_list::load_pair_symbols;
use crate::utils::get_database_path;

/// Candle intervals requested from the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    Daily,
    Hourly,
    Minute,
}

impl Interval {
    /// Convert to Binance kline format ("1d", "1h", "1m")
    pub fn to_binance_format(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Hourly => "1h",
            Interval::Minute => "1m",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "1d" | "daily" => Ok(Interval::Daily),
            "1h" | "hourly" => Ok(Interval::Hourly),
            "1m" | "minute" => Ok(Interval::Minute),
            _ => Err(format!("Invalid interval: {}. Valid options: 1d, 1h, 1m", s)),
        }
    }
}

/// Configuration for the ingestion sweep
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Binance API key, sent as `X-MBX-APIKEY`
    pub api_key: Option<String>,

    /// Binance REST base URL
    pub base_url: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pairs to ingest, in sweep order
    pub coins: Vec<String>,

    pub interval: Interval,

    /// Candles per page request
    pub page_limit: u32,

    /// Rows per bulk insert
    pub chunk_size: usize,

    pub page_delay: Duration,
    pub coin_delay: Duration,
    pub sweep_interval: Duration,

    /// Same-page retries after a rate-limit response
    pub rate_limit_retries: u32,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BINANCE_BASE_URL.to_string(),
            database_path: get_database_path(),
            coins: DEFAULT_COINS.iter().map(|s| s.to_string()).collect(),
            interval: Interval::Daily,
            page_limit: DEFAULT_PAGE_LIMIT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            coin_delay: Duration::from_millis(DEFAULT_COIN_DELAY_MS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
        }
    }
}

impl EtlConfig {
    /// Build config from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.api_key = env_string("BINANCE_API_KEY");

        if let Some(url) = env_string("BINANCE_BASE_URL") {
            config.base_url = url;
        }

        if let Some(file) = env_string("ETL_COINS_FILE") {
            config.coins = load_pair_symbols(&file)?;
        } else if let Some(list) = env_string("ETL_COINS") {
            config.coins = parse_coin_list(&list);
        }

        if let Some(interval) = env_string("ETL_INTERVAL") {
            config.interval = Interval::from_str(&interval).map_err(AppError::Config)?;
        }

        if let Some(limit) = env_parse::<u32>("ETL_PAGE_LIMIT")? {
            config.page_limit = limit;
        }
        if let Some(size) = env_parse::<usize>("ETL_CHUNK_SIZE")? {
            config.chunk_size = size;
        }
        if let Some(ms) = env_parse::<u64>("ETL_PAGE_DELAY_MS")? {
            config.page_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ETL_COIN_DELAY_MS")? {
            config.coin_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("ETL_SWEEP_INTERVAL_SECS")? {
            config.sweep_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Reject settings the sweep cannot run with
    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(AppError::Config(
                    "BINANCE_API_KEY is not set".to_string(),
                ))
            }
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                self.base_url
            )));
        }

        if self.coins.is_empty() {
            return Err(AppError::Config("No coins configured".to_string()));
        }
        if self.page_limit == 0 || self.page_limit > 1000 {
            return Err(AppError::Config(format!(
                "page_limit must be within 1..=1000, got {}",
                self.page_limit
            )));
        }
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }

        Ok(())
    }
}

/// Split a comma-separated pair list, normalising case and dropping blanks
pub fn parse_coin_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(None),
    }
}
