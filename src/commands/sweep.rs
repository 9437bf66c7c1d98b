use crate::commands::{ingestion_source, open_ingestion_database};
use crate::error::Result;
use crate::models::{EtlConfig, SweepReport};
use crate::worker::{IngestionScheduler, Shutdown};

/// Run a single sweep and print the per-coin outcome
pub async fn run(config: EtlConfig) -> Result<()> {
    let source = ingestion_source(&config)?;
    let db = open_ingestion_database(&config).await?;

    println!("🔄 Sweeping {} coin(s)...\n", config.coins.len());

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let scheduler = IngestionScheduler::new(config, source, db.pool().clone());
    let report = scheduler.run_sweep(&shutdown).await;
    db.close().await;

    print_report(&report);
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!(
        "{:<12} {:>9} {:>9} {:>7} {:>7} {:>5}",
        "PAIR", "FETCHED", "INSERTED", "FAILED", "TICKER", "BOOK"
    );
    for coin in &report.coins {
        println!(
            "{:<12} {:>9} {:>9} {:>7} {:>7} {:>5}",
            coin.pair_symbol,
            coin.fetched,
            coin.inserted,
            coin.failed_chunks,
            flag(coin.ticker_saved),
            flag(coin.order_book_saved),
        );
        if let Some(ref error) = coin.error {
            println!("   ⚠️  {}", error);
        }
    }

    println!();
    if report.interrupted {
        println!("⏹️  Sweep interrupted by shutdown request");
    }
    println!(
        "✅ Sweep {} finished in {:.1}s: {} new candle(s), {} coin(s) with problems",
        report.sweep_id,
        report.duration.as_secs_f64(),
        report.total_inserted(),
        report.failed_coins()
    );
}

fn flag(saved: bool) -> &'static str {
    if saved {
        "yes"
    } else {
        "no"
    }
}
