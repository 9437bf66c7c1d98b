use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling 24h statistics for a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    /// Last traded price, stored as the snapshot close
    pub last_price: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub trade_count: i64,
}

/// Best bid/ask at the top of the book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
}

/// A `Ticker24h` taken for a coin at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSnapshot {
    pub coin_id: i64,
    pub snapshot_time: DateTime<Utc>,
    pub stats: Ticker24h,
}

/// A `BookTicker` taken for a coin at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSnapshot {
    pub coin_id: i64,
    pub snapshot_time: DateTime<Utc>,
    pub book: BookTicker,
}
