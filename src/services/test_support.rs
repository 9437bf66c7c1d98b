//! Scripted `MarketDataSource` and fixtures shared by the service tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tempfile::TempDir;

use crate::error::{AppError, Result};
use crate::models::{BookTicker, Candle, Interval, Ticker24h};
use crate::services::binance_client::MarketDataSource;
use crate::services::database::Database;

pub const DAY_MS: i64 = 86_400_000;

/// 2024-01-01 00:00:00 UTC
pub const BASE_MS: i64 = 1_704_067_200_000;

/// Daily candle opening `day` days after `BASE_MS`
pub fn daily_candle(day: i64, close: f64) -> Candle {
    let open_time = BASE_MS + day * DAY_MS;
    Candle {
        open_time,
        close_time: open_time + DAY_MS - 1,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10.0,
        quote_asset_volume: 10.0 * close,
        trade_count: 5,
        taker_buy_base_volume: 4.0,
        taker_buy_quote_volume: 4.0 * close,
    }
}

pub fn daily_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(day, close)| daily_candle(day as i64, *close))
        .collect()
}

pub async fn temp_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db")).await.unwrap();
    (dir, db)
}

#[derive(Default)]
struct ScriptState {
    candles: HashMap<String, Vec<Candle>>,
    candle_calls: usize,
    ticker_calls: usize,
    book_calls: usize,
    /// Rate-limit responses still to hand out before serving candles
    rate_limits_remaining: usize,
    failing_candles: Vec<String>,
    failing_tickers: Vec<String>,
    failing_books: Vec<String>,
    rate_limited_tickers: Vec<String>,
    /// Every request in arrival order
    calls: Vec<(&'static str, Instant)>,
}

/// In-memory exchange that serves candles from a fixed script
#[derive(Default)]
pub struct ScriptedSource {
    state: Mutex<ScriptState>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(self, pair: &str, candles: Vec<Candle>) -> Self {
        self.state
            .lock()
            .unwrap()
            .candles
            .insert(pair.to_string(), candles);
        self
    }

    pub fn fail_candles_for(self, pair: &str) -> Self {
        self.state.lock().unwrap().failing_candles.push(pair.to_string());
        self
    }

    pub fn fail_ticker_for(self, pair: &str) -> Self {
        self.state.lock().unwrap().failing_tickers.push(pair.to_string());
        self
    }

    pub fn fail_book_for(self, pair: &str) -> Self {
        self.state.lock().unwrap().failing_books.push(pair.to_string());
        self
    }

    pub fn rate_limit_ticker_for(self, pair: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rate_limited_tickers
            .push(pair.to_string());
        self
    }

    pub fn rate_limit_times(self, times: usize) -> Self {
        self.state.lock().unwrap().rate_limits_remaining = times;
        self
    }

    pub fn candle_calls(&self) -> usize {
        self.state.lock().unwrap().candle_calls
    }

    pub fn ticker_calls(&self) -> usize {
        self.state.lock().unwrap().ticker_calls
    }

    pub fn book_calls(&self) -> usize {
        self.state.lock().unwrap().book_calls
    }

    /// (endpoint, time) of every request so far
    pub fn call_log(&self) -> Vec<(&'static str, Instant)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn fetch_candles(
        &self,
        pair_symbol: &str,
        _interval: Interval,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let mut state = self.state.lock().unwrap();
        state.candle_calls += 1;
        state.calls.push(("klines", Instant::now()));

        if state.rate_limits_remaining > 0 {
            state.rate_limits_remaining -= 1;
            return Err(AppError::RateLimit { retry_after: None });
        }
        if state.failing_candles.iter().any(|p| p == pair_symbol) {
            return Err(AppError::Network(format!("{} unreachable", pair_symbol)));
        }

        Ok(state
            .candles
            .get(pair_symbol)
            .map(|candles| {
                candles
                    .iter()
                    .filter(|c| c.open_time >= start_ms && c.open_time <= end_ms)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_24h_ticker(&self, pair_symbol: &str) -> Result<Ticker24h> {
        let mut state = self.state.lock().unwrap();
        state.ticker_calls += 1;
        state.calls.push(("ticker", Instant::now()));

        if state.rate_limited_tickers.iter().any(|p| p == pair_symbol) {
            return Err(AppError::RateLimit { retry_after: None });
        }
        if state.failing_tickers.iter().any(|p| p == pair_symbol) {
            return Err(AppError::Network("ticker endpoint down".to_string()));
        }

        Ok(Ticker24h {
            open_price: 100.0,
            high_price: 110.0,
            low_price: 95.0,
            last_price: 105.0,
            volume: 1_000.0,
            quote_volume: 105_000.0,
            price_change: 5.0,
            price_change_percent: 5.0,
            trade_count: 42,
        })
    }

    async fn fetch_book_ticker(&self, pair_symbol: &str) -> Result<BookTicker> {
        let mut state = self.state.lock().unwrap();
        state.book_calls += 1;
        state.calls.push(("book", Instant::now()));

        if state.failing_books.iter().any(|p| p == pair_symbol) {
            return Err(AppError::Network("book endpoint down".to_string()));
        }

        Ok(BookTicker {
            bid_price: 104.9,
            bid_qty: 2.0,
            ask_price: 105.1,
            ask_qty: 3.0,
        })
    }
}
