//! MetricsRepository trait definition.

use chrono::{DateTime, Utc};
use zeno_types::error::RepositoryError;
use zeno_types::metric::{TurnMetric, TurnStats};

/// Repository trait for turn metrics: the write-side sink and the
/// read-side aggregates used by the admin view.
///
/// Implementations live in zeno-infra (e.g., `SqliteMetricsRepository`).
pub trait MetricsRepository: Send + Sync {
    /// Record one resolved turn.
    fn record_metric(
        &self,
        metric: &TurnMetric,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Aggregates: request count and mean latency since `since`, all-time
    /// fallback count, and successful turns per model.
    fn stats(
        &self,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<TurnStats, RepositoryError>> + Send;

    /// The newest `limit` metrics, newest first.
    fn recent_metrics(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<TurnMetric>, RepositoryError>> + Send;
}
