use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::models::{CoinOutcome, EtlConfig, SweepReport};
use crate::services::{
    BatchWriter, HistoryFetcher, IngestionCursor, MarketDataSource, SnapshotCollector,
    SymbolRegistry,
};
use crate::worker::Shutdown;

/// Drives the sweep/sleep cycle over the configured coins
///
/// One sweep walks the coins in configured order and, for each, registers
/// it, tops up its candle history, then captures the ticker and order-book
/// snapshots. Coins are processed one at a time with `coin_delay` between
/// them; failures stay inside the coin that hit them.
pub struct IngestionScheduler {
    config: EtlConfig,
    registry: SymbolRegistry,
    cursor: IngestionCursor,
    fetcher: HistoryFetcher,
    writer: BatchWriter,
    snapshots: SnapshotCollector,
}

impl IngestionScheduler {
    pub fn new(config: EtlConfig, source: Arc<dyn MarketDataSource>, pool: SqlitePool) -> Self {
        let fetcher = HistoryFetcher::new(
            source.clone(),
            config.interval,
            config.page_limit,
            config.page_delay,
            config.rate_limit_retries,
        );

        Self {
            registry: SymbolRegistry::new(pool.clone()),
            cursor: IngestionCursor::new(pool.clone()),
            writer: BatchWriter::new(pool.clone(), config.chunk_size),
            snapshots: SnapshotCollector::new(source, pool).with_backoff_base(config.page_delay),
            fetcher,
            config,
        }
    }

    /// Sweep forever until `shutdown` fires
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: &Shutdown) {
        info!(
            coins = self.config.coins.len(),
            interval = self.config.interval.to_binance_format(),
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Starting ingestion scheduler"
        );

        let mut iteration = 0u64;
        loop {
            iteration += 1;
            let report = self.run_sweep(shutdown).await;

            if report.interrupted || shutdown.is_triggered() {
                break;
            }

            info!(
                iteration,
                next_sweep_in_secs = self.config.sweep_interval.as_secs(),
                "Sleeping until next sweep"
            );
            if !shutdown.sleep(self.config.sweep_interval).await {
                break;
            }
        }

        info!(sweeps = iteration, "Ingestion scheduler stopped");
    }

    /// Run exactly one sweep over every configured coin
    pub async fn run_sweep(&self, shutdown: &Shutdown) -> SweepReport {
        let sweep_id = Uuid::new_v4();
        let span = info_span!("sweep", sweep_id = %sweep_id);
        self.sweep(sweep_id, shutdown).instrument(span).await
    }

    async fn sweep(&self, sweep_id: Uuid, shutdown: &Shutdown) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::new(sweep_id);

        info!(coins = self.config.coins.len(), "Sweep started");

        for (index, pair_symbol) in self.config.coins.iter().enumerate() {
            if shutdown.is_triggered() {
                info!(processed = index, "Shutdown requested, ending sweep early");
                report.interrupted = true;
                break;
            }
            if index > 0 && !shutdown.sleep(self.config.coin_delay).await {
                report.interrupted = true;
                break;
            }

            report.coins.push(self.sync_coin(pair_symbol, shutdown).await);
        }

        report.duration = started.elapsed();
        info!(
            coins = report.coins.len(),
            fetched = report.total_fetched(),
            rows = report.total_inserted(),
            failed_coins = report.failed_coins(),
            interrupted = report.interrupted,
            duration_ms = report.duration.as_millis() as u64,
            "Sweep finished"
        );
        report
    }

    /// One coin's unit of work; never fails, errors land in the outcome
    #[instrument(skip(self, shutdown), fields(coin = %pair_symbol))]
    async fn sync_coin(&self, pair_symbol: &str, shutdown: &Shutdown) -> CoinOutcome {
        let started = Instant::now();
        let mut outcome = CoinOutcome::new(pair_symbol);

        let coin_id = match self.registry.resolve(pair_symbol).await {
            Ok(id) => id,
            Err(e) => {
                error!(phase = "resolve", error = %e, "Failed to resolve coin, skipping");
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        outcome.coin_id = Some(coin_id);

        if let Some(pause) = self.sync_history(pair_symbol, coin_id, shutdown, &mut outcome).await {
            info!(
                phase = "cooldown",
                delay_ms = pause.as_millis() as u64,
                "Rate limit still active, pausing before snapshots"
            );
            if !shutdown.sleep(pause).await {
                return outcome;
            }
        }

        let snapshots = self.snapshots.collect(pair_symbol, coin_id, Some(shutdown)).await;
        outcome.ticker_saved = snapshots.ticker_saved;
        outcome.order_book_saved = snapshots.order_book_saved;

        info!(
            phase = "done",
            fetched = outcome.fetched,
            rows = outcome.inserted,
            failed_chunks = outcome.failed_chunks,
            ticker_saved = outcome.ticker_saved,
            order_book_saved = outcome.order_book_saved,
            duration_ms = started.elapsed().as_millis() as u64,
            "Coin synced"
        );
        outcome
    }

    /// Top up the coin's candles; returns the pause owed when rate limited
    async fn sync_history(
        &self,
        pair_symbol: &str,
        coin_id: i64,
        shutdown: &Shutdown,
        outcome: &mut CoinOutcome,
    ) -> Option<Duration> {
        let start_ms = match self.cursor.resolve_start(coin_id).await {
            Ok(start) => start,
            Err(e) => {
                error!(phase = "cursor", error = %e, "Failed to resolve ingestion cursor");
                outcome.error = Some(e.to_string());
                return None;
            }
        };
        let end_ms = Utc::now().timestamp_millis();

        let candles = match self
            .fetcher
            .fetch_range(pair_symbol, start_ms, end_ms, Some(shutdown))
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                if e.is_rate_limit() {
                    warn!(phase = "fetch", error = %e, "Candle fetch rate limited, retrying next sweep");
                } else if e.is_transient() {
                    warn!(phase = "fetch", error = %e, "Candle fetch failed, retrying next sweep");
                } else {
                    error!(phase = "fetch", error = %e, "Candle fetch failed");
                }
                outcome.error = Some(e.to_string());
                return self.fetcher.cooldown(&e);
            }
        };
        outcome.fetched = candles.len();

        match self.writer.persist(coin_id, &candles).await {
            Ok(persisted) => {
                outcome.inserted = persisted.inserted;
                outcome.failed_chunks = persisted.failed_chunks;
            }
            Err(e) => {
                error!(phase = "persist", error = %e, "Failed to persist candles");
                outcome.error = Some(e.to_string());
            }
        }
        None
    }
}
