//! Coin List Model
//!
//! Loads the list of pairs to ingest from a JSON file such as:
//!
//! ```json
//! { "quote": "USDT", "data": [ { "symbol": "BTC" }, { "symbol": "ETH", "pair": "ETHUSDT" } ] }
//! ```
//!
//! Entries without an explicit `pair` get the quote asset appended.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::constants::QUOTE_ASSET;
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct CoinListEntry {
    pub symbol: String,
    #[serde(default)]
    pub pair: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoinList {
    #[serde(default)]
    pub quote: Option<String>,
    pub data: Vec<CoinListEntry>,
}

impl CoinList {
    /// Pair symbols in file order, upper-cased and de-duplicated
    pub fn pair_symbols(&self) -> Vec<String> {
        let quote = self.quote.as_deref().unwrap_or(QUOTE_ASSET).to_uppercase();
        let mut pairs: Vec<String> = Vec::with_capacity(self.data.len());

        for entry in &self.data {
            let pair = match &entry.pair {
                Some(pair) => pair.trim().to_uppercase(),
                None => format!("{}{}", entry.symbol.trim().to_uppercase(), quote),
            };
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }

        pairs
    }
}

/// Load pair symbols from a coin list JSON file
pub fn load_pair_symbols<P: AsRef<Path>>(file_path: P) -> Result<Vec<String>> {
    let path = file_path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let list: CoinList = serde_json::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Invalid coin list {}: {}", path.display(), e)))?;

    Ok(list.pair_symbols())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pair_symbols_append_quote() {
        let list: CoinList = serde_json::from_str(
            r#"{"data":[{"symbol":"btc"},{"symbol":"ETH","pair":"ethusdt"},{"symbol":"BTC"}]}"#,
        )
        .unwrap();

        assert_eq!(list.pair_symbols(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_load_pair_symbols_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coins.json");
        fs::write(&path, r#"{"quote":"FDUSD","data":[{"symbol":"SOL"}]}"#).unwrap();

        assert_eq!(load_pair_symbols(&path).unwrap(), vec!["SOLFDUSD"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_pair_symbols("/nonexistent/coins.json");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
