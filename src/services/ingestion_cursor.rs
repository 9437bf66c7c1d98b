use sqlx::SqlitePool;
use tracing::debug;

use crate::constants::HISTORY_FLOOR_MS;
use crate::error::Result;

/// Works out where the next fetch for a coin should begin
#[derive(Debug, Clone)]
pub struct IngestionCursor {
    pool: SqlitePool,
}

impl IngestionCursor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One millisecond past the newest stored candle, or the history floor
    /// for a coin with no candles yet
    pub async fn resolve_start(&self, coin_id: i64) -> Result<i64> {
        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(open_time) FROM price_history WHERE coin_id = ?1")
                .bind(coin_id)
                .fetch_one(&self.pool)
                .await?;

        let start = match latest {
            Some(open_time) => open_time + 1,
            None => HISTORY_FLOOR_MS,
        };
        debug!(coin_id, latest_open_time = ?latest, start, "Resolved ingestion cursor");
        Ok(start)
    }
}
