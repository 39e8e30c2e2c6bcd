//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `zeno-core` using sqlx with split read/write pools:
//! raw queries, private Row structs, split reader/writer pool usage.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;
use zeno_core::chat::repository::ChatRepository;
use zeno_types::chat::{ChatMessage, MessageRole, Session};
use zeno_types::error::RepositoryError;

use super::pool::{DatabasePool, format_datetime, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    created_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        Ok(Session {
            id: parse_uuid(&self.id, "session id")?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        Ok(ChatMessage {
            id: parse_uuid(&self.id, "message id")?,
            session_id: parse_uuid(&self.session_id, "session id")?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.message().contains("FOREIGN KEY constraint failed"),
        _ => false,
    }
}

impl ChatRepository for SqliteChatRepository {
    async fn create_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        sqlx::query("INSERT INTO sessions (id, created_at) VALUES (?, ?)")
            .bind(session.id.to_string())
            .bind(format_datetime(&session.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.message().contains("UNIQUE") => {
                    RepositoryError::Conflict(format!("session {} already exists", session.id))
                }
                other => RepositoryError::Query(other.to_string()),
            })?;

        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT id, created_at FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            SessionRow::from_row(&r)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_session()
        })
        .transpose()
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages (id, session_id, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                RepositoryError::NotFound
            } else {
                RepositoryError::Query(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, session_id, role, content, created_at FROM messages
               WHERE session_id = ?
               ORDER BY created_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        oldest_first(&rows)
    }

    async fn recent_dialogue(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, session_id, role, content, created_at FROM messages
               WHERE session_id = ? AND role != 'system'
               ORDER BY created_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        oldest_first(&rows)
    }
}

/// Map newest-first rows to messages in chronological order.
fn oldest_first(rows: &[SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    let mut messages = rows
        .iter()
        .map(|r| {
            MessageRow::from_row(r)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_message()
        })
        .collect::<Result<Vec<_>, _>>()?;
    messages.reverse();
    Ok(messages)
}
