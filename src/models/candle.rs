use serde::{Deserialize, Serialize};

/// One OHLCV interval record as returned by the exchange
///
/// Times are UTC epoch milliseconds, exactly as Binance reports them. The
/// owning coin is not part of the record; it is attached when the candle is
/// persisted into `price_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Interval open time (ms)
    pub open_time: i64,

    /// Interval close time (ms), `open_time + interval - 1`
    pub close_time: i64,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Base asset volume
    pub volume: f64,

    /// Quote asset volume
    pub quote_asset_volume: f64,

    /// Number of trades in the interval
    pub trade_count: i64,

    /// Taker buy base asset volume
    pub taker_buy_base_volume: f64,

    /// Taker buy quote asset volume
    pub taker_buy_quote_volume: f64,
}
