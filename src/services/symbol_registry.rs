use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{display_symbol, Coin};
use crate::utils::ms_to_datetime;

/// Maps exchange pair symbols to stable internal coin ids
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    pool: SqlitePool,
}

impl SymbolRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Coin id for a pair, registering the pair on first sight
    ///
    /// Insert-ignore-then-select, so two callers racing on an unseen pair both
    /// end up with the same id instead of one of them failing.
    pub async fn resolve(&self, pair_symbol: &str) -> Result<i64> {
        let pair_symbol = pair_symbol.trim().to_uppercase();
        if pair_symbol.is_empty() {
            return Err(AppError::InvalidInput("Empty pair symbol".to_string()));
        }

        if let Some(id) = self.lookup(&pair_symbol).await? {
            return Ok(id);
        }

        let symbol = display_symbol(&pair_symbol);
        let inserted = sqlx::query(
            "INSERT INTO coins (symbol, pair_symbol, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(pair_symbol) DO NOTHING",
        )
        .bind(&symbol)
        .bind(&pair_symbol)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await;

        match inserted.map_err(AppError::from) {
            Ok(result) if result.rows_affected() > 0 => {
                info!(pair = %pair_symbol, symbol = %symbol, "Registered new coin");
            }
            Ok(_) => debug!(pair = %pair_symbol, "Coin registered concurrently"),
            Err(AppError::DuplicateKey(_)) => {
                debug!(pair = %pair_symbol, "Coin registered concurrently")
            }
            Err(e) => return Err(e),
        }

        self.lookup(&pair_symbol).await?.ok_or_else(|| {
            AppError::NotFound(format!("Coin {} missing after registration", pair_symbol))
        })
    }

    async fn lookup(&self, pair_symbol: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM coins WHERE pair_symbol = ?1")
            .bind(pair_symbol)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    /// All registered coins ordered by display symbol
    pub async fn list(&self) -> Result<Vec<Coin>> {
        let rows = sqlx::query(
            "SELECT id, symbol, pair_symbol, created_at FROM coins ORDER BY symbol, pair_symbol",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_coin).collect()
    }

    /// Find a coin by display symbol (`BTC`) or pair symbol (`BTCUSDT`)
    pub async fn find(&self, symbol: &str) -> Result<Option<Coin>> {
        let symbol = symbol.trim().to_uppercase();
        let row = sqlx::query(
            "SELECT id, symbol, pair_symbol, created_at FROM coins
             WHERE symbol = ?1 OR pair_symbol = ?1
             ORDER BY pair_symbol = ?1 DESC, id
             LIMIT 1",
        )
        .bind(&symbol)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_coin).transpose()
    }
}

fn row_to_coin(row: &sqlx::sqlite::SqliteRow) -> Result<Coin> {
    Ok(Coin {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        pair_symbol: row.try_get("pair_symbol")?,
        created_at: ms_to_datetime(row.try_get("created_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::temp_database;

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (_dir, db) = temp_database().await;
        let registry = SymbolRegistry::new(db.pool().clone());

        let first = registry.resolve("BTCUSDT").await.unwrap();
        let second = registry.resolve("btcusdt").await.unwrap();
        let other = registry.resolve("ETHUSDT").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(db.stats().await.unwrap().coins, 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_sight_yields_one_coin() {
        let (_dir, db) = temp_database().await;
        let registry = SymbolRegistry::new(db.pool().clone());

        let (a, b, c) = tokio::join!(
            registry.resolve("SOLUSDT"),
            registry.resolve("SOLUSDT"),
            registry.resolve("SOLUSDT"),
        );

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        assert_eq!(db.stats().await.unwrap().coins, 1);
    }

    #[tokio::test]
    async fn test_list_and_find() {
        let (_dir, db) = temp_database().await;
        let registry = SymbolRegistry::new(db.pool().clone());

        registry.resolve("XRPUSDT").await.unwrap();
        let btc_id = registry.resolve("BTCUSDT").await.unwrap();

        let coins = registry.list().await.unwrap();
        let symbols: Vec<&str> = coins.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "XRP"]);

        let btc = registry.find("btc").await.unwrap().unwrap();
        assert_eq!(btc.id, btc_id);
        assert_eq!(btc.pair_symbol, "BTCUSDT");
        assert!(registry.find("DOGE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_symbol() {
        let (_dir, db) = temp_database().await;
        let registry = SymbolRegistry::new(db.pool().clone());

        assert!(matches!(
            registry.resolve("  ").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
