use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::QUOTE_ASSET;

/// Internal coin identity, created on first ingestion of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: i64,

    /// Display symbol, e.g. `BTC`
    pub symbol: String,

    /// Exchange pair, e.g. `BTCUSDT` (unique, immutable)
    pub pair_symbol: String,

    pub created_at: DateTime<Utc>,
}

/// Strip the quote asset suffix from a pair symbol
///
/// `BTCUSDT` -> `BTC`. A pair that does not end in the quote asset (or is
/// nothing but the quote asset) keeps its full name.
pub fn display_symbol(pair_symbol: &str) -> String {
    match pair_symbol.strip_suffix(QUOTE_ASSET) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => pair_symbol.to_string(),
    }
}
