mod alert;
mod candle;
mod coin;
pub mod coin_list;
mod snapshot;
mod sweep;
mod sync_config;

pub use alert::{AlertReport, AlertReportEntry, AlertResult, AlertType, AnomalyAlert};
pub use candle::Candle;
pub use coin::{display_symbol, Coin};
pub use coin_list::load_pair_symbols;
pub use snapshot::{BookTicker, OrderBookSnapshot, Ticker24h, TickerSnapshot};
pub use sweep::{CoinOutcome, SweepReport};
pub use sync_config::{parse_coin_list, EtlConfig, Interval};
