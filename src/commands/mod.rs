pub mod alerts;
pub mod run;
pub mod status;
pub mod sweep;

use std::sync::Arc;

use crate::error::Result;
use crate::models::EtlConfig;
use crate::services::{BinanceClient, Database, MarketDataSource};

/// Open the configured database, creating the schema on first use
pub(crate) async fn open_database(config: &EtlConfig) -> Result<Database> {
    Database::new(config.database_path.clone()).await
}

/// Open the database for ingestion, refusing a store filled at another interval
pub(crate) async fn open_ingestion_database(config: &EtlConfig) -> Result<Database> {
    let db = open_database(config).await?;
    db.ensure_interval(config.interval).await?;
    Ok(db)
}

/// Validate the ingestion settings and build the exchange client
pub(crate) fn ingestion_source(config: &EtlConfig) -> Result<Arc<dyn MarketDataSource>> {
    config.validate()?;
    let client = BinanceClient::new(&config.base_url, config.api_key.clone())?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::Interval;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ingestion_rejects_interval_change() {
        let dir = tempdir().unwrap();
        let daily = EtlConfig {
            database_path: dir.path().join("coins.db"),
            interval: Interval::Daily,
            ..Default::default()
        };
        open_ingestion_database(&daily).await.unwrap().close().await;

        let hourly = EtlConfig {
            interval: Interval::Hourly,
            ..daily.clone()
        };
        let result = open_ingestion_database(&hourly).await;
        assert!(matches!(result, Err(AppError::Config(_))));

        // Read-only commands are unaffected
        open_database(&hourly).await.unwrap().close().await;
    }
}
