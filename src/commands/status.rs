use crate::commands::open_database;
use crate::error::Result;
use crate::models::EtlConfig;
use crate::services::SymbolRegistry;

pub async fn run(config: EtlConfig) -> Result<()> {
    let db = open_database(&config).await?;
    let stats = db.stats().await?;
    let coins = SymbolRegistry::new(db.pool().clone()).list().await?;

    println!("📊 coinsweep status\n");
    println!("   📁 Database:        {}", db.path().display());
    println!("   🪙 Coins:           {}", format_number(stats.coins));
    println!("   🕯️  Candles:         {}", format_number(stats.candles));
    println!("   📈 Ticker snaps:    {}", format_number(stats.ticker_snapshots));
    println!("   📖 Order book snaps: {}", format_number(stats.order_book_snapshots));
    println!("   🚨 Alerts:          {}", format_number(stats.alerts));

    if !coins.is_empty() {
        let symbols: Vec<&str> = coins.iter().map(|c| c.symbol.as_str()).collect();
        println!("\n   Tracked: {}", symbols.join(", "));
    } else {
        println!("\n⚠️  No coins ingested yet. Run 'coinsweep sweep' first.");
    }

    db.close().await;
    Ok(())
}

fn format_number(n: i64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
