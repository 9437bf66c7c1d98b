use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::AppError;
use crate::models::Interval;

/// SQLite store shared by ingestion and alerting
///
/// Owns the connection pool; components take a clone of `pool()` and acquire
/// connections per statement or per chunk transaction.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    database_path: PathBuf,
}

/// Database schema version for migrations
const DB_SCHEMA_VERSION: &str = "1";

/// Metadata key holding the candle interval `price_history` was filled with
const CANDLE_INTERVAL_KEY: &str = "candle_interval";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS coins (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        pair_symbol TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_coins_pair_symbol ON coins(pair_symbol)",
    r#"
    CREATE TABLE IF NOT EXISTS price_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        open_time INTEGER NOT NULL,
        close_time INTEGER NOT NULL,
        open_price REAL NOT NULL,
        high_price REAL NOT NULL,
        low_price REAL NOT NULL,
        close_price REAL NOT NULL,
        volume REAL NOT NULL,
        quote_asset_volume REAL NOT NULL,
        trade_count INTEGER NOT NULL,
        taker_buy_base_volume REAL NOT NULL,
        taker_buy_quote_volume REAL NOT NULL,
        created_at INTEGER NOT NULL,
        CHECK (close_time >= open_time)
    )
    "#,
    // Re-fetch overlap relies on this index to stay duplicate free
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_price_history_coin_open ON price_history(coin_id, open_time)",
    "CREATE INDEX IF NOT EXISTS idx_price_history_coin_close ON price_history(coin_id, close_time DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS ticker_24h_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        snapshot_time INTEGER NOT NULL,
        open_price REAL NOT NULL,
        high_price REAL NOT NULL,
        low_price REAL NOT NULL,
        close_price REAL NOT NULL,
        volume REAL NOT NULL,
        quote_asset_volume REAL NOT NULL,
        price_change REAL NOT NULL,
        price_change_percent REAL NOT NULL,
        trade_count INTEGER NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_ticker_coin_time ON ticker_24h_stats(coin_id, snapshot_time)",
    r#"
    CREATE TABLE IF NOT EXISTS order_book_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        snapshot_time INTEGER NOT NULL,
        bid_price REAL NOT NULL,
        bid_qty REAL NOT NULL,
        ask_price REAL NOT NULL,
        ask_qty REAL NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_order_book_coin_time ON order_book_snapshots(coin_id, snapshot_time)",
    r#"
    CREATE TABLE IF NOT EXISTS anomaly_alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin_id INTEGER NOT NULL REFERENCES coins(id),
        alert_date TEXT NOT NULL,
        current_price REAL NOT NULL,
        reference_price REAL NOT NULL,
        change_percent REAL NOT NULL,
        alert_type TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_coin_date ON anomaly_alerts(coin_id, alert_date)",
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

impl Database {
    /// Open (or create) the database and bootstrap the schema
    pub async fn new(database_path: PathBuf) -> Result<Self, AppError> {
        info!("Initializing SQLite database at: {:?}", database_path);

        // Ensure parent directory exists
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(|e| AppError::Config(format!("Storage unreachable at {:?}: {}", database_path, e)))?;

        let db = Self { pool, database_path };
        db.initialize_schema().await?;

        info!("SQLite database initialized successfully");
        Ok(db)
    }

    async fn initialize_schema(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)")
            .bind(DB_SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Pin the candle interval on first use and reject a different one later
    ///
    /// `price_history` holds a single series per coin, so mixing intervals
    /// would corrupt the resume cursor and the anomaly window.
    pub async fn ensure_interval(&self, interval: Interval) -> Result<(), AppError> {
        let requested = interval.to_binance_format();

        sqlx::query("INSERT INTO metadata (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING")
            .bind(CANDLE_INTERVAL_KEY)
            .bind(requested)
            .execute(&self.pool)
            .await?;

        let stored: String = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?1")
            .bind(CANDLE_INTERVAL_KEY)
            .fetch_one(&self.pool)
            .await?;

        if stored != requested {
            return Err(AppError::Config(format!(
                "Database {:?} holds {} candles, refusing to ingest {} candles into it",
                self.database_path, stored, requested
            )));
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    /// Row counts per table
    pub async fn stats(&self) -> Result<DatabaseStats, AppError> {
        let coins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coins")
            .fetch_one(&self.pool)
            .await?;
        let candles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
            .fetch_one(&self.pool)
            .await?;
        let ticker_snapshots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ticker_24h_stats")
            .fetch_one(&self.pool)
            .await?;
        let order_book_snapshots: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_book_snapshots")
                .fetch_one(&self.pool)
                .await?;
        let alerts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM anomaly_alerts")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            coins,
            candles,
            ticker_snapshots,
            order_book_snapshots,
            alerts,
        })
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite database connection pool closed");
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub coins: i64,
    pub candles: i64,
    pub ticker_snapshots: i64,
    pub order_book_snapshots: i64,
    pub alerts: i64,
}
