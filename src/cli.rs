use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;

use crate::commands;
use crate::error::{AppError, Result};
use crate::models::{parse_coin_list, EtlConfig, Interval};

#[derive(Parser)]
#[command(name = "coinsweep")]
#[command(about = "Binance market-data ingestion and price anomaly alerts", long_about = None)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Comma-separated pairs to ingest, e.g. BTCUSDT,ETHUSDT
    #[arg(long, global = true)]
    pub coins: Option<String>,

    /// Candle interval (1d, 1h, 1m)
    #[arg(long, global = true)]
    pub interval: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest continuously until interrupted
    Run {
        /// Seconds to sleep between sweeps
        #[arg(long)]
        sweep_interval_secs: Option<u64>,
    },
    /// Run a single sweep and exit
    Sweep,
    /// Check for large price moves
    Alerts {
        /// Display symbol (BTC) or pair (BTCUSDT); all coins when omitted
        #[arg(short, long)]
        symbol: Option<String>,
    },
    /// Show row counts per table
    Status,
}

impl Cli {
    /// Environment config with command-line overrides applied
    fn config(&self) -> Result<EtlConfig> {
        let mut config = EtlConfig::from_env()?;

        if let Some(ref path) = self.database {
            config.database_path = path.clone();
        }
        if let Some(ref coins) = self.coins {
            config.coins = parse_coin_list(coins);
        }
        if let Some(ref interval) = self.interval {
            config.interval = Interval::from_str(interval).map_err(AppError::Config)?;
        }
        if let Commands::Run {
            sweep_interval_secs: Some(secs),
        } = self.command
        {
            config.sweep_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.config() {
        Ok(config) => match cli.command {
            Commands::Run { .. } => commands::run::run(config).await,
            Commands::Sweep => commands::sweep::run(config).await,
            Commands::Alerts { symbol } => commands::alerts::run(config, symbol).await,
            Commands::Status => commands::status::run(config).await,
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("❌ Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alerts_with_symbol() {
        let cli = Cli::try_parse_from(["coinsweep", "alerts", "--symbol", "BTC"]).unwrap();
        match cli.command {
            Commands::Alerts { symbol } => assert_eq!(symbol.as_deref(), Some("BTC")),
            _ => panic!("expected alerts"),
        }
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "coinsweep",
            "run",
            "--sweep-interval-secs",
            "60",
            "--coins",
            "btcusdt,ethusdt",
            "--database",
            "/tmp/x.db",
        ])
        .unwrap();

        assert_eq!(cli.coins.as_deref(), Some("btcusdt,ethusdt"));
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(
            cli.command,
            Commands::Run {
                sweep_interval_secs: Some(60)
            }
        ));
    }
}
