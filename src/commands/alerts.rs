//! Anomaly check command
//!
//! Usage:
//! - All coins: `coinsweep alerts`
//! - One coin:  `coinsweep alerts --symbol BTC`

use crate::commands::open_database;
use crate::error::{AppError, Result};
use crate::models::{AlertReport, AlertReportEntry, EtlConfig};
use crate::services::{AnomalyDetector, SymbolRegistry};

pub async fn run(config: EtlConfig, symbol: Option<String>) -> Result<()> {
    let db = open_database(&config).await?;
    let detector = AnomalyDetector::new(db.pool().clone());

    let report = match symbol {
        Some(symbol) => {
            let coin = SymbolRegistry::new(db.pool().clone())
                .find(&symbol)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Coin '{}' has not been ingested", symbol)))?;

            let mut report = AlertReport {
                checked: 1,
                ..Default::default()
            };
            if let Some(result) = detector.check(coin.id).await? {
                report.entries.push(AlertReportEntry {
                    coin: coin.symbol,
                    result,
                });
            }
            report
        }
        None => detector.check_all().await?,
    };
    db.close().await;

    print_report(&report);
    Ok(())
}

fn print_report(report: &AlertReport) {
    if report.entries.is_empty() {
        println!("✅ No anomalies across {} coin(s)", report.checked);
        return;
    }

    println!("🚨 Anomaly alerts\n");
    for entry in &report.entries {
        let result = &entry.result;
        let status = if result.is_fresh {
            "NEW"
        } else if result.is_stale {
            "STALE"
        } else {
            "TODAY"
        };
        let arrow = if result.alert.is_increase() { "📈" } else { "📉" };

        println!(
            "{} {:<8} {:>9}  {} -> {}  ({})  [{}]",
            arrow,
            entry.coin,
            entry.change_display(),
            entry.reference_price_display(),
            entry.current_price_display(),
            result.alert.alert_date,
            status
        );
    }

    println!(
        "\n{} alert(s), {} new, {} coin(s) checked, {} failed",
        report.entries.len(),
        report.fresh_count(),
        report.checked,
        report.failed
    );
}
