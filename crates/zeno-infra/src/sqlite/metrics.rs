//! SQLite turn metrics repository.
//!
//! Write side is a single INSERT per turn; the read side computes the admin
//! dashboard aggregates with plain SQL on the reader pool.

use chrono::{DateTime, Utc};
use sqlx::Row;
use zeno_core::metrics::repository::MetricsRepository;
use zeno_types::error::RepositoryError;
use zeno_types::metric::{ModelUsage, TurnMetric, TurnStats, TurnStatus};

use super::pool::{DatabasePool, format_datetime, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `MetricsRepository`.
pub struct SqliteMetricsRepository {
    pool: DatabasePool,
}

impl SqliteMetricsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct MetricRow {
    id: String,
    created_at: String,
    session_id: String,
    model_used: String,
    latency_ms: i64,
    fallback_triggered: bool,
    tokens: i64,
    status: String,
    error_message: Option<String>,
}

impl MetricRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            session_id: row.try_get("session_id")?,
            model_used: row.try_get("model_used")?,
            latency_ms: row.try_get("latency_ms")?,
            fallback_triggered: row.try_get("fallback_triggered")?,
            tokens: row.try_get("tokens")?,
            status: row.try_get("status")?,
            error_message: row.try_get("error_message")?,
        })
    }

    fn into_metric(self) -> Result<TurnMetric, RepositoryError> {
        let status: TurnStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        Ok(TurnMetric {
            id: parse_uuid(&self.id, "metric id")?,
            created_at: parse_datetime(&self.created_at)?,
            session_id: parse_uuid(&self.session_id, "session id")?,
            model_used: self.model_used,
            latency_ms: self.latency_ms.max(0) as u64,
            fallback_triggered: self.fallback_triggered,
            tokens: self.tokens.max(0) as u64,
            status,
            error_message: self.error_message,
        })
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

impl MetricsRepository for SqliteMetricsRepository {
    async fn record_metric(&self, metric: &TurnMetric) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO turn_metrics (id, created_at, session_id, model_used, latency_ms, fallback_triggered, tokens, status, error_message)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(metric.id.to_string())
        .bind(format_datetime(&metric.created_at))
        .bind(metric.session_id.to_string())
        .bind(&metric.model_used)
        .bind(i64::try_from(metric.latency_ms).unwrap_or(i64::MAX))
        .bind(metric.fallback_triggered)
        .bind(i64::try_from(metric.tokens).unwrap_or(i64::MAX))
        .bind(metric.status.to_string())
        .bind(&metric.error_message)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<TurnStats, RepositoryError> {
        let since = format_datetime(&since);

        let window = sqlx::query(
            r#"SELECT COUNT(*) AS cnt, AVG(latency_ms) AS avg_latency
               FROM turn_metrics WHERE created_at > ?"#,
        )
        .bind(&since)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_err)?;
        let req_last_hour: i64 = window.try_get("cnt").map_err(query_err)?;
        let avg_latency: Option<f64> = window.try_get("avg_latency").map_err(query_err)?;

        let fallback = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM turn_metrics WHERE fallback_triggered = 1",
        )
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_err)?;
        let fallback_count: i64 = fallback.try_get("cnt").map_err(query_err)?;

        let rows = sqlx::query(
            r#"SELECT model_used, COUNT(*) AS cnt FROM turn_metrics
               WHERE status = 'success'
               GROUP BY model_used
               ORDER BY cnt DESC, model_used ASC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        let model_distribution = rows
            .iter()
            .map(|r| {
                Ok(ModelUsage {
                    model: r.try_get("model_used").map_err(query_err)?,
                    count: r.try_get("cnt").map_err(query_err)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(TurnStats {
            req_last_hour,
            avg_latency: round2(avg_latency.unwrap_or(0.0)),
            fallback_count,
            model_distribution,
        })
    }

    async fn recent_metrics(&self, limit: u32) -> Result<Vec<TurnMetric>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM turn_metrics
               ORDER BY created_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|r| MetricRow::from_row(r).map_err(query_err)?.into_metric())
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
