pub mod ingestion_worker;
pub mod shutdown;

pub use ingestion_worker::IngestionScheduler;
pub use shutdown::Shutdown;
