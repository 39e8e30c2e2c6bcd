//! ChatRepository trait definition.
//!
//! Durable record of sessions and their append-only messages.

use uuid::Uuid;
use zeno_types::chat::{ChatMessage, Session};
use zeno_types::error::RepositoryError;

/// Repository trait for session and message persistence.
///
/// Implementations live in zeno-infra (e.g., `SqliteChatRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRepository: Send + Sync {
    /// Create a new session.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Get a session by its unique ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Append a message. Fails with `NotFound` if the session does not exist.
    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The newest `limit` messages of a session, returned oldest-first.
    fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Like [`recent_messages`](Self::recent_messages), but `system` rows
    /// are excluded before the limit is applied.
    fn recent_dialogue(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
