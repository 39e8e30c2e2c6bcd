//! Per-turn telemetry records and the aggregates built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sentinel stored as `model_used` when every model failed.
pub const NO_MODEL: &str = "none";

/// Outcome of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Success,
    Failed,
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Success => write!(f, "success"),
            TurnStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TurnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(TurnStatus::Success),
            "failed" => Ok(TurnStatus::Failed),
            other => Err(format!("invalid turn status: '{other}'")),
        }
    }
}

/// One write-once record per resolved turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetric {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session_id: Uuid,
    /// Model that produced the answer, or [`NO_MODEL`].
    pub model_used: String,
    pub latency_ms: u64,
    pub fallback_triggered: bool,
    /// Approximate output token count, see [`approximate_tokens`].
    pub tokens: u64,
    pub status: TurnStatus,
    pub error_message: Option<String>,
}

/// Output token estimate: one token per four characters.
///
/// This is an approximation, not tokenization.
pub fn approximate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Usage count for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub count: i64,
}

/// Aggregates for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStats {
    pub req_last_hour: i64,
    /// Mean latency over the last hour in milliseconds, rounded to 2 dp.
    pub avg_latency: f64,
    pub fallback_count: i64,
    pub model_distribution: Vec<ModelUsage>,
}

/// Compact row for the live request feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRequest {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub session: Uuid,
    pub model: String,
    pub latency: u64,
    pub fallback: bool,
    pub status: TurnStatus,
}

impl From<TurnMetric> for LiveRequest {
    fn from(m: TurnMetric) -> Self {
        Self {
            id: m.id,
            time: m.created_at,
            session: m.session_id,
            model: m.model_used,
            latency: m.latency_ms,
            fallback: m.fallback_triggered,
            status: m.status,
        }
    }
}
