//! Long-running ingestion
//!
//! Sweeps every configured coin, sleeps `sweep_interval`, and repeats until
//! Ctrl+C or SIGTERM. A signal received mid-sweep lets the current coin
//! finish its in-flight insert before the scheduler exits.

use tracing::info;

use crate::commands::{ingestion_source, open_ingestion_database};
use crate::error::Result;
use crate::models::EtlConfig;
use crate::worker::{IngestionScheduler, Shutdown};

pub async fn run(config: EtlConfig) -> Result<()> {
    let source = ingestion_source(&config)?;
    let db = open_ingestion_database(&config).await?;

    println!("🚀 Starting coinsweep ingestion");
    println!("   📁 Database: {}", db.path().display());
    println!("   🪙 Coins:    {}", config.coins.join(", "));
    println!(
        "   ⏱️  Interval: {} candles, sweep every {}s",
        config.interval.to_binance_format(),
        config.sweep_interval.as_secs()
    );

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let scheduler = IngestionScheduler::new(config, source, db.pool().clone());
    scheduler.run(&shutdown).await;

    db.close().await;
    info!("Ingestion stopped cleanly");
    println!("👋 Stopped");
    Ok(())
}
