use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of anomaly an alert records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Close-to-close move at or above the rolling threshold
    LargeMove,
}

impl AlertType {
    /// Get string representation for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LargeMove => "large_move",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "large_move" => Some(AlertType::LargeMove),
            _ => None,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A triggered anomaly, unique per (coin, alert date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub coin_id: i64,

    /// Close date of the triggering candle
    pub alert_date: NaiveDate,

    /// Close of the triggering candle
    pub current_price: f64,

    /// Close of the candle before it
    pub reference_price: f64,

    /// Close-to-close change in percent
    pub change_percent: f64,

    pub alert_type: AlertType,

    /// Set by the store on insert; `None` for an alert not yet persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AnomalyAlert {
    pub fn is_increase(&self) -> bool {
        self.change_percent > 0.0
    }
}

/// Outcome of one anomaly check for a coin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertResult {
    pub alert: AnomalyAlert,

    /// The returned alert is older than the newest candle
    pub is_stale: bool,

    /// The alert was triggered by this check rather than read back from history
    pub is_fresh: bool,

    /// This check wrote the alert row
    pub inserted: bool,

    /// Threshold (percentage points) used by this check
    pub threshold: f64,
}

/// One line of an all-coins alert report
#[derive(Debug, Clone, Serialize)]
pub struct AlertReportEntry {
    pub coin: String,
    pub result: AlertResult,
}

impl AlertReportEntry {
    /// e.g. `+30.00%`
    pub fn change_display(&self) -> String {
        format!("{:+.2}%", self.result.alert.change_percent)
    }

    /// e.g. `$130.000000`
    pub fn current_price_display(&self) -> String {
        format!("${:.6}", self.result.alert.current_price)
    }

    pub fn reference_price_display(&self) -> String {
        format!("${:.6}", self.result.alert.reference_price)
    }
}

/// Results of checking every registered coin
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertReport {
    pub checked: usize,
    pub failed: usize,
    pub entries: Vec<AlertReportEntry>,
}

impl AlertReport {
    /// Alerts triggered by this run (not read back from history)
    pub fn fresh_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_fresh).count()
    }
}
