use std::time::Duration;
use uuid::Uuid;

/// Result of one coin's unit of work inside a sweep
#[derive(Debug, Clone, Default)]
pub struct CoinOutcome {
    pub pair_symbol: String,
    pub coin_id: Option<i64>,

    /// Candles returned by the exchange
    pub fetched: usize,

    /// Rows actually written to `price_history`
    pub inserted: usize,

    /// Bulk-insert chunks that failed and were skipped
    pub failed_chunks: usize,

    pub ticker_saved: bool,
    pub order_book_saved: bool,

    /// First error that cut the coin's work short, if any
    pub error: Option<String>,
}

impl CoinOutcome {
    pub fn new(pair_symbol: &str) -> Self {
        Self {
            pair_symbol: pair_symbol.to_string(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_chunks == 0 && self.ticker_saved && self.order_book_saved
    }
}

/// Statistics for one full pass over the configured coins
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub coins: Vec<CoinOutcome>,
    pub duration: Duration,

    /// Sweep stopped early on a shutdown request
    pub interrupted: bool,
}

impl SweepReport {
    pub fn new(sweep_id: Uuid) -> Self {
        Self {
            sweep_id,
            coins: Vec::new(),
            duration: Duration::ZERO,
            interrupted: false,
        }
    }

    pub fn total_inserted(&self) -> usize {
        self.coins.iter().map(|c| c.inserted).sum()
    }

    pub fn total_fetched(&self) -> usize {
        self.coins.iter().map(|c| c.fetched).sum()
    }

    pub fn failed_coins(&self) -> usize {
        self.coins.iter().filter(|c| !c.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let mut report = SweepReport::new(Uuid::new_v4());

        let mut btc = CoinOutcome::new("BTCUSDT");
        btc.fetched = 10;
        btc.inserted = 10;
        btc.ticker_saved = true;
        btc.order_book_saved = true;

        let mut eth = CoinOutcome::new("ETHUSDT");
        eth.fetched = 4;
        eth.inserted = 2;
        eth.failed_chunks = 1;
        eth.ticker_saved = true;

        report.coins.push(btc);
        report.coins.push(eth);

        assert_eq!(report.total_fetched(), 14);
        assert_eq!(report.total_inserted(), 12);
        assert_eq!(report.failed_coins(), 1);
    }
}
