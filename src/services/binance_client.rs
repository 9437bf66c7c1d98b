//! Binance Spot REST Client
//!
//! Thin async client over the three public market-data endpoints the sweep
//! needs:
//! - `GET /api/v3/klines` (paged candle history)
//! - `GET /api/v3/ticker/24hr` (rolling 24h statistics)
//! - `GET /api/v3/ticker/bookTicker` (best bid/ask)
//!
//! The client does no pacing of its own. The fixed inter-request delay and
//! the rate-limit backoff live in `HistoryFetcher` and the scheduler, so one
//! place decides how hard the exchange is hit.
//!
//! HTTP 429 and 418 responses become `AppError::RateLimit` carrying the
//! server's `Retry-After`, 5xx and transport failures become
//! `AppError::Network`, and malformed bodies become `AppError::Parse`.

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{BookTicker, Candle, Interval, Ticker24h};

/// The external market-data API, injected into the ingestion components
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Candles with `start_ms <= open_time <= end_ms`, oldest first, at most `limit`
    async fn fetch_candles(
        &self,
        pair_symbol: &str,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>>;

    async fn fetch_24h_ticker(&self, pair_symbol: &str) -> Result<Ticker24h>;

    async fn fetch_book_ticker(&self, pair_symbol: &str) -> Result<BookTicker>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker24h {
    open_price: String,
    high_price: String,
    low_price: String,
    last_price: String,
    volume: String,
    quote_volume: String,
    price_change: String,
    price_change_percent: String,
    count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookTicker {
    bid_price: String,
    bid_qty: String,
    ask_price: String,
    ask_qty: String,
}

/// Binance spot REST client
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl BinanceClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - REST root, e.g. "https://api.binance.com"
    /// * `api_key` - Sent as `X-MBX-APIKEY` when present
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Binance request: {} {:?}", url, query);

        let mut request = self.client.get(&url).query(query);
        if let Some(ref key) = self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request to {} failed: {}", path, e)))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(
                status = status.as_u16(),
                retry_after_secs = retry_after.map(|d| d.as_secs()),
                "Binance rate limit response"
            );
            return Err(AppError::RateLimit { retry_after });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read response body: {}", e)))?;

        if status.is_server_error() {
            return Err(AppError::Network(format!("Binance returned {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(AppError::InvalidInput(format!(
                "Binance returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("Failed to parse JSON from {}: {}", path, e)))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_candles(
        &self,
        pair_symbol: &str,
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let query = [
            ("symbol", pair_symbol.to_string()),
            ("interval", interval.to_binance_format().to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", limit.to_string()),
        ];

        let json = self.get_json("/api/v3/klines", &query).await?;
        let rows = json
            .as_array()
            .ok_or_else(|| AppError::Parse("klines response is not an array".to_string()))?;

        rows.iter().map(parse_kline).collect()
    }

    async fn fetch_24h_ticker(&self, pair_symbol: &str) -> Result<Ticker24h> {
        let json = self
            .get_json("/api/v3/ticker/24hr", &[("symbol", pair_symbol.to_string())])
            .await?;
        let raw: RawTicker24h = serde_json::from_value(json)?;

        Ok(Ticker24h {
            open_price: parse_decimal(&raw.open_price, "openPrice")?,
            high_price: parse_decimal(&raw.high_price, "highPrice")?,
            low_price: parse_decimal(&raw.low_price, "lowPrice")?,
            last_price: parse_decimal(&raw.last_price, "lastPrice")?,
            volume: parse_decimal(&raw.volume, "volume")?,
            quote_volume: parse_decimal(&raw.quote_volume, "quoteVolume")?,
            price_change: parse_decimal(&raw.price_change, "priceChange")?,
            price_change_percent: parse_decimal(&raw.price_change_percent, "priceChangePercent")?,
            trade_count: raw.count,
        })
    }

    async fn fetch_book_ticker(&self, pair_symbol: &str) -> Result<BookTicker> {
        let json = self
            .get_json("/api/v3/ticker/bookTicker", &[("symbol", pair_symbol.to_string())])
            .await?;
        let raw: RawBookTicker = serde_json::from_value(json)?;

        Ok(BookTicker {
            bid_price: parse_decimal(&raw.bid_price, "bidPrice")?,
            bid_qty: parse_decimal(&raw.bid_qty, "bidQty")?,
            ask_price: parse_decimal(&raw.ask_price, "askPrice")?,
            ask_qty: parse_decimal(&raw.ask_qty, "askQty")?,
        })
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| AppError::Parse(format!("Invalid '{}' value '{}': {}", field, raw, e)))
}

/// Parse one kline row
///
/// `[openTime, "open", "high", "low", "close", "volume", closeTime,
///   "quoteVolume", trades, "takerBuyBase", "takerBuyQuote", "ignore"]`
fn parse_kline(row: &Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 11)
        .ok_or_else(|| AppError::Parse(format!("Malformed kline row: {}", row)))?;

    let int_at = |idx: usize, name: &str| -> Result<i64> {
        fields[idx]
            .as_i64()
            .ok_or_else(|| AppError::Parse(format!("Missing or invalid '{}' field", name)))
    };
    let decimal_at = |idx: usize, name: &str| -> Result<f64> {
        match &fields[idx] {
            Value::String(s) => parse_decimal(s, name),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| AppError::Parse(format!("Invalid '{}' field", name))),
            _ => Err(AppError::Parse(format!("Missing or invalid '{}' field", name))),
        }
    };

    Ok(Candle {
        open_time: int_at(0, "openTime")?,
        open: decimal_at(1, "open")?,
        high: decimal_at(2, "high")?,
        low: decimal_at(3, "low")?,
        close: decimal_at(4, "close")?,
        volume: decimal_at(5, "volume")?,
        close_time: int_at(6, "closeTime")?,
        quote_asset_volume: decimal_at(7, "quoteAssetVolume")?,
        trade_count: int_at(8, "numberOfTrades")?,
        taker_buy_base_volume: decimal_at(9, "takerBuyBaseVolume")?,
        taker_buy_quote_volume: decimal_at(10, "takerBuyQuoteVolume")?,
    })
}
