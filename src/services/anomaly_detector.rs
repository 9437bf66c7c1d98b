//! Large-Move Detection
//!
//! Compares the latest close-to-close move of a coin against the typical
//! size of its recent moves:
//!
//! ```text
//! changes   = percent change of every close vs. the previous close
//! meanAbs   = mean(|changes|) over the loaded window
//! threshold = max(THRESHOLD_MULTIPLIER * meanAbs, MIN_THRESHOLD_PERCENT)
//! trigger   = |last change| >= threshold
//! ```
//!
//! A trigger is recorded through `AlertStore` (one row per coin and day). When
//! nothing triggers, the most recent stored alert is returned instead, flagged
//! stale if newer candles have arrived since.

use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    ANOMALY_WINDOW, MIN_CANDLES_FOR_CHECK, MIN_CHANGES_FOR_CHECK, MIN_THRESHOLD_PERCENT,
    THRESHOLD_MULTIPLIER,
};
use crate::error::Result;
use crate::models::{AlertReport, AlertReportEntry, AlertResult, AlertType, AnomalyAlert};
use crate::services::alert_store::AlertStore;
use crate::services::symbol_registry::SymbolRegistry;
use crate::utils::ms_to_date;

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    pool: SqlitePool,
    alerts: AlertStore,
    registry: SymbolRegistry,
}

/// Threshold evaluation over one window of closes
#[derive(Debug, Clone, Copy, PartialEq)]
struct Evaluation {
    last_change: f64,
    threshold: f64,
}

impl Evaluation {
    fn triggered(&self) -> bool {
        self.last_change.abs() >= self.threshold
    }
}

impl AnomalyDetector {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            alerts: AlertStore::new(pool.clone()),
            registry: SymbolRegistry::new(pool.clone()),
            pool,
        }
    }

    #[instrument(skip(self))]
    pub async fn check(&self, coin_id: i64) -> Result<Option<AlertResult>> {
        let window = self.load_window(coin_id).await?;
        if window.len() < MIN_CANDLES_FOR_CHECK {
            debug!(coin_id, candles = window.len(), "Not enough candles for anomaly check");
            return Ok(None);
        }

        let closes: Vec<f64> = window.iter().map(|(_, close)| *close).collect();
        let evaluation = match evaluate(&closes) {
            Some(evaluation) => evaluation,
            None => {
                debug!(coin_id, "Latest change is undefined, skipping anomaly check");
                return Ok(None);
            }
        };

        let (last_close_time, current_price) = window[window.len() - 1];
        let (_, reference_price) = window[window.len() - 2];
        let latest_date = ms_to_date(last_close_time);

        if evaluation.triggered() {
            let alert = AnomalyAlert {
                coin_id,
                alert_date: latest_date,
                current_price,
                reference_price,
                change_percent: evaluation.last_change,
                alert_type: AlertType::LargeMove,
                created_at: None,
            };
            let inserted = self.alerts.insert_if_absent(&alert).await?;

            info!(
                coin_id,
                change_percent = evaluation.last_change,
                threshold = evaluation.threshold,
                inserted,
                "Large move detected"
            );
            return Ok(Some(AlertResult {
                alert,
                is_stale: false,
                is_fresh: true,
                inserted,
                threshold: evaluation.threshold,
            }));
        }

        let previous = match self.alerts.latest(coin_id).await? {
            Some(alert) => alert,
            None => return Ok(None),
        };
        let is_stale = previous.alert_date < latest_date;

        debug!(
            coin_id,
            alert_date = %previous.alert_date,
            latest_date = %latest_date,
            is_stale,
            "No new trigger, returning last recorded alert"
        );
        Ok(Some(AlertResult {
            alert: previous,
            is_stale,
            is_fresh: false,
            inserted: false,
            threshold: evaluation.threshold,
        }))
    }

    /// Check every registered coin, ordered by display symbol
    ///
    /// A coin whose check fails is logged and counted, the rest still run.
    pub async fn check_all(&self) -> Result<AlertReport> {
        let coins = self.registry.list().await?;
        let mut report = AlertReport::default();

        for coin in coins {
            match self.check(coin.id).await {
                Ok(result) => {
                    report.checked += 1;
                    if let Some(result) = result {
                        report.entries.push(AlertReportEntry {
                            coin: coin.symbol,
                            result,
                        });
                    }
                }
                Err(e) => {
                    warn!(coin = %coin.symbol, error = %e, "Anomaly check failed, skipping coin");
                    report.failed += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            failed = report.failed,
            alerts = report.entries.len(),
            fresh = report.fresh_count(),
            "Anomaly check finished"
        );
        Ok(report)
    }

    /// Newest `ANOMALY_WINDOW` (close_time, close) pairs, oldest first
    async fn load_window(&self, coin_id: i64) -> Result<Vec<(i64, f64)>> {
        let rows = sqlx::query(
            "SELECT close_time, close_price FROM price_history \
             WHERE coin_id = ?1 ORDER BY close_time DESC LIMIT ?2",
        )
        .bind(coin_id)
        .bind(ANOMALY_WINDOW)
        .fetch_all(&self.pool)
        .await?;

        let mut window = rows
            .iter()
            .map(|row| Ok((row.try_get("close_time")?, row.try_get("close_price")?)))
            .collect::<Result<Vec<(i64, f64)>>>()?;
        window.reverse();
        Ok(window)
    }
}

/// Threshold and latest change for a window of closes (oldest first)
///
/// `None` when there are too few changes or the latest change is not finite.
fn evaluate(closes: &[f64]) -> Option<Evaluation> {
    let changes: Vec<f64> = closes
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0] * 100.0)
        .collect();
    if changes.len() < MIN_CHANGES_FOR_CHECK {
        return None;
    }

    let last_change = *changes.last()?;
    if !last_change.is_finite() {
        return None;
    }

    // NOTE: the baseline includes the change under test, which damps large
    // moves on short windows. Likely unintended but kept for continuity.
    let mean_abs = changes.iter().map(|c| c.abs()).sum::<f64>() / changes.len() as f64;
    let threshold = (THRESHOLD_MULTIPLIER * mean_abs).max(MIN_THRESHOLD_PERCENT);

    Some(Evaluation {
        last_change,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::batch_writer::BatchWriter;
    use crate::services::database::Database;
    use crate::services::test_support::{daily_candles, temp_database};
    use chrono::NaiveDate;

    async fn seed(db: &Database, pair: &str, closes: &[f64]) -> i64 {
        let coin_id = SymbolRegistry::new(db.pool().clone()).resolve(pair).await.unwrap();
        BatchWriter::new(db.pool().clone(), 50)
            .persist(coin_id, &daily_candles(closes))
            .await
            .unwrap();
        coin_id
    }

    fn flat_then(last: f64) -> Vec<f64> {
        let mut closes = vec![100.0; 9];
        closes.push(last);
        closes
    }

    #[test]
    fn test_evaluate_floor_threshold() {
        let evaluation = evaluate(&flat_then(130.0)).unwrap();
        assert!((evaluation.last_change - 30.0).abs() < 1e-9);
        // meanAbs = 30 / 9, 3x = 10 > floor
        assert!((evaluation.threshold - 10.0).abs() < 1e-9);
        assert!(evaluation.triggered());

        let calm = evaluate(&flat_then(101.0)).unwrap();
        assert_eq!(calm.threshold, MIN_THRESHOLD_PERCENT);
        assert!(!calm.triggered());
    }

    #[test]
    fn test_evaluate_rejects_undefined_change() {
        let mut closes = vec![100.0; 8];
        closes.push(0.0);
        closes.push(50.0);
        assert!(evaluate(&closes).is_none());
        assert!(evaluate(&[1.0, 2.0, 3.0]).is_none());
    }

    #[tokio::test]
    async fn test_large_move_triggers_alert() {
        let (_dir, db) = temp_database().await;
        let coin_id = seed(&db, "BTCUSDT", &flat_then(130.0)).await;
        let detector = AnomalyDetector::new(db.pool().clone());

        let result = detector.check(coin_id).await.unwrap().unwrap();

        assert!(result.is_fresh);
        assert!(result.inserted);
        assert!(!result.is_stale);
        assert!((result.alert.change_percent - 30.0).abs() < 1e-9);
        assert_eq!(result.alert.current_price, 130.0);
        assert_eq!(result.alert.reference_price, 100.0);
        assert_eq!(result.alert.alert_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert!(result.threshold >= MIN_THRESHOLD_PERCENT);
    }

    #[tokio::test]
    async fn test_repeated_checks_store_one_alert() {
        let (_dir, db) = temp_database().await;
        let coin_id = seed(&db, "BTCUSDT", &flat_then(130.0)).await;
        let detector = AnomalyDetector::new(db.pool().clone());

        let mut inserted = 0;
        for _ in 0..5 {
            let result = detector.check(coin_id).await.unwrap().unwrap();
            assert!(result.is_fresh);
            if result.inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(AlertStore::new(db.pool().clone()).count(coin_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nine_candles_is_not_enough() {
        let (_dir, db) = temp_database().await;
        let mut closes = vec![100.0; 8];
        closes.push(200.0);
        let coin_id = seed(&db, "ETHUSDT", &closes).await;
        let detector = AnomalyDetector::new(db.pool().clone());

        assert!(detector.check(coin_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_trigger_without_history_returns_none() {
        let (_dir, db) = temp_database().await;
        let coin_id = seed(&db, "ETHUSDT", &vec![100.0; 20]).await;
        let detector = AnomalyDetector::new(db.pool().clone());

        assert!(detector.check(coin_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_old_alert_is_flagged_stale() {
        let (_dir, db) = temp_database().await;
        // Closes for 2024-01-01 ..= 2024-01-20
        let coin_id = seed(&db, "SOLUSDT", &vec![100.0; 20]).await;
        let store = AlertStore::new(db.pool().clone());
        store
            .insert_if_absent(&AnomalyAlert {
                coin_id,
                alert_date: NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
                current_price: 100.0,
                reference_price: 80.0,
                change_percent: 25.0,
                alert_type: AlertType::LargeMove,
                created_at: None,
            })
            .await
            .unwrap();

        let detector = AnomalyDetector::new(db.pool().clone());
        let result = detector.check(coin_id).await.unwrap().unwrap();

        assert!(result.is_stale);
        assert!(!result.is_fresh);
        assert!(!result.inserted);
        assert_eq!(result.alert.change_percent, 25.0);
    }

    #[tokio::test]
    async fn test_same_day_alert_is_not_stale() {
        let (_dir, db) = temp_database().await;
        let coin_id = seed(&db, "BTCUSDT", &flat_then(130.0)).await;
        let detector = AnomalyDetector::new(db.pool().clone());
        detector.check(coin_id).await.unwrap();

        // Replace the spike's baseline so the latest candle no longer triggers
        sqlx::query("UPDATE price_history SET close_price = 129.0 WHERE coin_id = ?1 AND close_price = 100.0")
            .bind(coin_id)
            .execute(db.pool())
            .await
            .unwrap();

        let result = detector.check(coin_id).await.unwrap().unwrap();
        assert!(!result.is_fresh);
        assert!(!result.is_stale);
    }

    #[tokio::test]
    async fn test_check_all_orders_by_symbol() {
        let (_dir, db) = temp_database().await;
        seed(&db, "XRPUSDT", &flat_then(70.0)).await;
        seed(&db, "BTCUSDT", &flat_then(130.0)).await;
        seed(&db, "ETHUSDT", &vec![100.0; 12]).await;
        let detector = AnomalyDetector::new(db.pool().clone());

        let report = detector.check_all().await.unwrap();

        assert_eq!(report.checked, 3);
        assert_eq!(report.failed, 0);
        let coins: Vec<&str> = report.entries.iter().map(|e| e.coin.as_str()).collect();
        assert_eq!(coins, vec!["BTC", "XRP"]);
        assert_eq!(report.fresh_count(), 2);
        assert_eq!(report.entries[0].change_display(), "+30.00%");
        assert_eq!(report.entries[0].current_price_display(), "$130.000000");
        assert_eq!(report.entries[1].change_display(), "-30.00%");
    }
}
