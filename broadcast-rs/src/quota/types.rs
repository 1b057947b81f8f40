use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Counting window for a metered limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Since midnight UTC
    Daily,
    /// Since the first of the month
    Monthly,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Daily => "daily",
            WindowKind::Monthly => "monthly",
        }
    }

    /// Start of the window containing `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let date = match self {
            WindowKind::Daily => date,
            WindowKind::Monthly => date.with_day0(0).unwrap_or(date),
        };
        date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Outcome of a quota check
///
/// A value type, never persisted; denials are returned, not thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub current: i64,
    pub limit: i64,
    pub unlimited: bool,
    pub message: Option<String>,
}

impl QuotaDecision {
    /// `-1` limits are always allowed without ever reading usage
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            current: 0,
            limit: -1,
            unlimited: true,
            message: None,
        }
    }

    pub fn within(current: i64, limit: i64) -> Self {
        Self {
            allowed: true,
            current,
            limit,
            unlimited: false,
            message: None,
        }
    }

    pub fn exceeded(current: i64, limit: i64, what: &str) -> Self {
        Self {
            allowed: false,
            current,
            limit,
            unlimited: false,
            message: Some(format!("{} limit reached ({}/{})", what, current, limit)),
        }
    }
}
