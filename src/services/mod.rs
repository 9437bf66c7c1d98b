pub mod alert_store;
pub mod anomaly_detector;
pub mod batch_writer;
pub mod binance_client;
pub mod database;
pub mod history_fetcher;
pub mod ingestion_cursor;
pub mod snapshot_collector;
pub mod symbol_registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use alert_store::AlertStore;
pub use anomaly_detector::AnomalyDetector;
pub use batch_writer::{BatchWriter, PersistOutcome};
pub use binance_client::{BinanceClient, MarketDataSource};
pub use database::{Database, DatabaseStats};
pub use history_fetcher::HistoryFetcher;
pub use ingestion_cursor::IngestionCursor;
pub use snapshot_collector::{SnapshotCollector, SnapshotOutcome};
pub use symbol_registry::SymbolRegistry;
