//! Ingestion and Detection Constants
//!
//! Defaults for the sweep cadence, the Binance paging limits and the
//! anomaly threshold. Every value here can be overridden through `EtlConfig`
//! except the detector parameters, which are fixed.

/// Quote asset stripped from a pair symbol to get the display symbol
/// (e.g. `BTCUSDT` -> `BTC`)
pub const QUOTE_ASSET: &str = "USDT";

/// Binance REST base URL
pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";

/// First ingestion for a coin starts here (2017-08-17 00:00:00 UTC, Binance spot launch)
pub const HISTORY_FLOOR_MS: i64 = 1_502_928_000_000;

/// Candles requested per page (Binance max is 1000)
pub const DEFAULT_PAGE_LIMIT: u32 = 1000;

/// Delay between successive page requests
pub const DEFAULT_PAGE_DELAY_MS: u64 = 300;

/// Delay between coins inside one sweep
pub const DEFAULT_COIN_DELAY_MS: u64 = 1000;

/// Sleep between sweeps (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Rows per bulk insert
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Re-requests of the same page after a rate-limit response
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 3;

/// Upper bound for a single rate-limit backoff sleep
pub const MAX_BACKOFF_SECS: u64 = 60;

/// Coins ingested when neither `ETL_COINS` nor `ETL_COINS_FILE` is set
pub const DEFAULT_COINS: &[&str] = &["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"];

/// Candles loaded for the rolling anomaly window
pub const ANOMALY_WINDOW: i64 = 100;

/// Minimum candles required before the detector evaluates a coin
pub const MIN_CANDLES_FOR_CHECK: usize = 10;

/// Minimum close-to-close changes required before the detector evaluates a coin
pub const MIN_CHANGES_FOR_CHECK: usize = 5;

/// Threshold = max(mean |change| * multiplier, floor)
pub const THRESHOLD_MULTIPLIER: f64 = 3.0;

/// Threshold floor in percentage points
pub const MIN_THRESHOLD_PERCENT: f64 = 5.0;
