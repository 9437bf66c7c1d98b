use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{AlertType, AnomalyAlert};
use crate::utils::ms_to_datetime;

/// Append-only history of anomaly alerts, at most one per (coin, date)
#[derive(Debug, Clone)]
pub struct AlertStore {
    pool: SqlitePool,
}

impl AlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store the alert unless one already exists for its coin and date
    ///
    /// Returns whether this call wrote the row.
    pub async fn insert_if_absent(&self, alert: &AnomalyAlert) -> Result<bool> {
        if self.exists(alert.coin_id, alert.alert_date).await? {
            debug!(coin_id = alert.coin_id, date = %alert.alert_date, "Alert already recorded");
            return Ok(false);
        }

        // A concurrent writer can slip in between the check and the insert
        let result = sqlx::query(
            "INSERT INTO anomaly_alerts (coin_id, alert_date, current_price, reference_price, \
             change_percent, alert_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(coin_id, alert_date) DO NOTHING",
        )
        .bind(alert.coin_id)
        .bind(alert.alert_date)
        .bind(alert.current_price)
        .bind(alert.reference_price)
        .bind(alert.change_percent)
        .bind(alert.alert_type.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            info!(
                coin_id = alert.coin_id,
                date = %alert.alert_date,
                change_percent = alert.change_percent,
                "Recorded anomaly alert"
            );
        }
        Ok(inserted)
    }

    async fn exists(&self, coin_id: i64, alert_date: NaiveDate) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM anomaly_alerts WHERE coin_id = ?1 AND alert_date = ?2")
                .bind(coin_id)
                .bind(alert_date)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Most recent alert for a coin by alert date
    pub async fn latest(&self, coin_id: i64) -> Result<Option<AnomalyAlert>> {
        let row = sqlx::query(
            "SELECT coin_id, alert_date, current_price, reference_price, change_percent, \
             alert_type, created_at FROM anomaly_alerts \
             WHERE coin_id = ?1 ORDER BY alert_date DESC LIMIT 1",
        )
        .bind(coin_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let alert_type: String = row.try_get("alert_type")?;
        let alert_type = AlertType::from_str(&alert_type)
            .ok_or_else(|| AppError::Parse(format!("Unknown alert type '{}'", alert_type)))?;

        Ok(Some(AnomalyAlert {
            coin_id: row.try_get("coin_id")?,
            alert_date: row.try_get("alert_date")?,
            current_price: row.try_get("current_price")?,
            reference_price: row.try_get("reference_price")?,
            change_percent: row.try_get("change_percent")?,
            alert_type,
            created_at: Some(ms_to_datetime(row.try_get("created_at")?)),
        }))
    }

    pub async fn count(&self, coin_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM anomaly_alerts WHERE coin_id = ?1")
            .bind(coin_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
