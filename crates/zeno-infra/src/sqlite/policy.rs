//! SQLite routing policy persistence.
//!
//! The policy is a singleton stored as one JSON document in row `id = 1`.

use chrono::Utc;
use sqlx::Row;
use zeno_core::policy::repository::PolicyRepository;
use zeno_types::error::RepositoryError;
use zeno_types::policy::RoutingPolicy;

use super::pool::{DatabasePool, format_datetime};

/// SQLite-backed implementation of `PolicyRepository`.
pub struct SqlitePolicyRepository {
    pool: DatabasePool,
}

impl SqlitePolicyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl PolicyRepository for SqlitePolicyRepository {
    async fn load_policy(&self) -> Result<Option<RoutingPolicy>, RepositoryError> {
        let row = sqlx::query("SELECT policy_json FROM routing_policy WHERE id = 1")
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row
            .try_get("policy_json")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| RepositoryError::Query(format!("invalid stored policy: {e}")))
    }

    async fn save_policy(&self, policy: &RoutingPolicy) -> Result<(), RepositoryError> {
        let json =
            serde_json::to_string(policy).map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO routing_policy (id, policy_json, updated_at)
               VALUES (1, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   policy_json = excluded.policy_json,
                   updated_at = excluded.updated_at"#,
        )
        .bind(json)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
