use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::DEFAULT_PAGE_DELAY_MS;
use crate::error::{AppError, Result};
use crate::models::{OrderBookSnapshot, TickerSnapshot};
use crate::services::binance_client::MarketDataSource;
use crate::services::history_fetcher::backoff_delay;
use crate::worker::Shutdown;

/// Which snapshots a `collect` call managed to store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub ticker_saved: bool,
    pub order_book_saved: bool,
}

/// Captures point-in-time 24h statistics and top-of-book for a coin
///
/// The two captures are independent: a failure of one is logged and does
/// not prevent the other. A rate-limited ticker read is followed by a backoff
/// pause before the order-book read goes out.
pub struct SnapshotCollector {
    source: Arc<dyn MarketDataSource>,
    pool: SqlitePool,
    backoff_base: Duration,
}

impl SnapshotCollector {
    pub fn new(source: Arc<dyn MarketDataSource>, pool: SqlitePool) -> Self {
        Self {
            source,
            pool,
            backoff_base: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }

    /// Base of the pause taken after a rate-limit response
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub async fn collect(
        &self,
        pair_symbol: &str,
        coin_id: i64,
        shutdown: Option<&Shutdown>,
    ) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();

        match self.capture_ticker(pair_symbol, coin_id).await {
            Ok(()) => outcome.ticker_saved = true,
            Err(AppError::RateLimit { retry_after }) => {
                let pause = backoff_delay(self.backoff_base, 1, retry_after);
                warn!(
                    pair = pair_symbol,
                    coin_id,
                    delay_ms = pause.as_millis() as u64,
                    "24h ticker rate limited, pausing before order book"
                );
                let completed = match shutdown {
                    Some(shutdown) => shutdown.sleep(pause).await,
                    None => {
                        tokio::time::sleep(pause).await;
                        true
                    }
                };
                if !completed {
                    return outcome;
                }
            }
            Err(e) => warn!(pair = pair_symbol, coin_id, error = %e, "Failed to capture 24h ticker"),
        }

        match self.capture_order_book(pair_symbol, coin_id).await {
            Ok(()) => outcome.order_book_saved = true,
            Err(e) => warn!(pair = pair_symbol, coin_id, error = %e, "Failed to capture order book"),
        }

        debug!(
            pair = pair_symbol,
            ticker_saved = outcome.ticker_saved,
            order_book_saved = outcome.order_book_saved,
            "Snapshot collection finished"
        );
        outcome
    }

    async fn capture_ticker(&self, pair_symbol: &str, coin_id: i64) -> Result<()> {
        let stats = self.source.fetch_24h_ticker(pair_symbol).await?;
        let snapshot = TickerSnapshot {
            coin_id,
            snapshot_time: Utc::now(),
            stats,
        };

        sqlx::query(
            "INSERT INTO ticker_24h_stats (coin_id, snapshot_time, open_price, high_price, \
             low_price, close_price, volume, quote_asset_volume, price_change, \
             price_change_percent, trade_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(coin_id, snapshot_time) DO NOTHING",
        )
        .bind(snapshot.coin_id)
        .bind(snapshot.snapshot_time.timestamp_millis())
        .bind(snapshot.stats.open_price)
        .bind(snapshot.stats.high_price)
        .bind(snapshot.stats.low_price)
        .bind(snapshot.stats.last_price)
        .bind(snapshot.stats.volume)
        .bind(snapshot.stats.quote_volume)
        .bind(snapshot.stats.price_change)
        .bind(snapshot.stats.price_change_percent)
        .bind(snapshot.stats.trade_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn capture_order_book(&self, pair_symbol: &str, coin_id: i64) -> Result<()> {
        let book = self.source.fetch_book_ticker(pair_symbol).await?;
        let snapshot = OrderBookSnapshot {
            coin_id,
            snapshot_time: Utc::now(),
            book,
        };

        sqlx::query(
            "INSERT INTO order_book_snapshots (coin_id, snapshot_time, bid_price, bid_qty, \
             ask_price, ask_qty) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(coin_id, snapshot_time) DO NOTHING",
        )
        .bind(snapshot.coin_id)
        .bind(snapshot.snapshot_time.timestamp_millis())
        .bind(snapshot.book.bid_price)
        .bind(snapshot.book.bid_qty)
        .bind(snapshot.book.ask_price)
        .bind(snapshot.book.ask_qty)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
