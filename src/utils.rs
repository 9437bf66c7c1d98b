use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;

/// Get database path from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/coinsweep.db"))
}

/// Convert epoch milliseconds to a UTC timestamp, clamping garbage to the epoch
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// UTC calendar date of an epoch-millisecond timestamp
pub fn ms_to_date(ms: i64) -> NaiveDate {
    ms_to_datetime(ms).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HISTORY_FLOOR_MS;

    #[test]
    fn test_history_floor_date() {
        assert_eq!(
            ms_to_date(HISTORY_FLOOR_MS),
            NaiveDate::from_ymd_opt(2017, 8, 17).unwrap()
        );
    }

    #[test]
    fn test_close_time_maps_to_same_day() {
        // Binance daily close time is 23:59:59.999 of the open day
        let close_ms = HISTORY_FLOOR_MS + 86_400_000 - 1;
        assert_eq!(ms_to_date(close_ms), ms_to_date(HISTORY_FLOOR_MS));
    }
}
