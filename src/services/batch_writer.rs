use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, error};

use crate::error::Result;
use crate::models::Candle;

/// What a `persist` call wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Rows actually inserted; duplicates already stored are not counted
    pub inserted: usize,

    /// Chunks the store rejected and that were skipped
    pub failed_chunks: usize,
}

/// Bulk candle writer
///
/// Rows go in as one multi-row insert per chunk. A row whose
/// (coin_id, open_time) is already stored is skipped silently. A chunk the
/// store rejects is logged and dropped while the remaining chunks still run.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    pool: SqlitePool,
    chunk_size: usize,
}

impl BatchWriter {
    pub fn new(pool: SqlitePool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn persist(&self, coin_id: i64, candles: &[Candle]) -> Result<PersistOutcome> {
        let mut outcome = PersistOutcome::default();
        if candles.is_empty() {
            return Ok(outcome);
        }

        let created_at = Utc::now().timestamp_millis();

        for (index, chunk) in candles.chunks(self.chunk_size).enumerate() {
            match self.insert_chunk(coin_id, chunk, created_at).await {
                Ok(inserted) => {
                    debug!(coin_id, chunk = index, rows = chunk.len(), inserted, "Persisted candle chunk");
                    outcome.inserted += inserted;
                }
                Err(e) => {
                    error!(
                        coin_id,
                        chunk = index,
                        rows = chunk.len(),
                        first_open_time = chunk[0].open_time,
                        error = %e,
                        "Failed to persist candle chunk, skipping"
                    );
                    outcome.failed_chunks += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn insert_chunk(&self, coin_id: i64, chunk: &[Candle], created_at: i64) -> Result<usize> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO price_history (coin_id, open_time, close_time, open_price, high_price, \
             low_price, close_price, volume, quote_asset_volume, trade_count, \
             taker_buy_base_volume, taker_buy_quote_volume, created_at) ",
        );

        builder.push_values(chunk, |mut row, candle| {
            row.push_bind(coin_id)
                .push_bind(candle.open_time)
                .push_bind(candle.close_time)
                .push_bind(candle.open)
                .push_bind(candle.high)
                .push_bind(candle.low)
                .push_bind(candle.close)
                .push_bind(candle.volume)
                .push_bind(candle.quote_asset_volume)
                .push_bind(candle.trade_count)
                .push_bind(candle.taker_buy_base_volume)
                .push_bind(candle.taker_buy_quote_volume)
                .push_bind(created_at);
        });
        // Conflict clause is scoped to the unique key so CHECK failures still reject the chunk
        builder.push(" ON CONFLICT(coin_id, open_time) DO NOTHING");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::symbol_registry::SymbolRegistry;
    use crate::services::test_support::{daily_candles, temp_database};

    #[tokio::test]
    async fn test_persist_counts_only_new_rows() {
        let (_dir, db) = temp_database().await;
        let coin_id = SymbolRegistry::new(db.pool().clone())
            .resolve("BTCUSDT")
            .await
            .unwrap();
        let writer = BatchWriter::new(db.pool().clone(), 4);

        let candles = daily_candles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);

        let first = writer.persist(coin_id, &candles[..6]).await.unwrap();
        assert_eq!(first, PersistOutcome { inserted: 6, failed_chunks: 0 });

        // Overlapping re-fetch
        let second = writer.persist(coin_id, &candles).await.unwrap();
        assert_eq!(second, PersistOutcome { inserted: 4, failed_chunks: 0 });

        let third = writer.persist(coin_id, &candles).await.unwrap();
        assert_eq!(third.inserted, 0);

        assert_eq!(db.stats().await.unwrap().candles, 10);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let (_dir, db) = temp_database().await;
        let coin_id = SymbolRegistry::new(db.pool().clone())
            .resolve("ETHUSDT")
            .await
            .unwrap();
        let writer = BatchWriter::new(db.pool().clone(), 3);

        let mut candles = daily_candles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        // Break the middle chunk: close before open violates the table check
        candles[4].close_time = candles[4].open_time - 1;

        let outcome = writer.persist(coin_id, &candles).await.unwrap();

        assert_eq!(outcome, PersistOutcome { inserted: 6, failed_chunks: 1 });
        assert_eq!(db.stats().await.unwrap().candles, 6);
    }

    #[tokio::test]
    async fn test_persist_empty_is_noop() {
        let (_dir, db) = temp_database().await;
        let writer = BatchWriter::new(db.pool().clone(), 10);

        let outcome = writer.persist(1, &[]).await.unwrap();
        assert_eq!(outcome, PersistOutcome::default());
    }
}
