//! Conversation store: session creation, message appends and history reads.

use tracing::debug;
use uuid::Uuid;
use zeno_types::chat::{ChatMessage, MessageRole, Session};
use zeno_types::error::RepositoryError;

use crate::chat::repository::ChatRepository;

/// Session lifecycle and message persistence on top of a `ChatRepository`.
///
/// Generic over the repository to maintain clean architecture (zeno-core
/// never depends on zeno-infra).
pub struct ChatService<C: ChatRepository> {
    chat_repo: C,
}

impl<C: ChatRepository> ChatService<C> {
    pub fn new(chat_repo: C) -> Self {
        Self { chat_repo }
    }

    /// Access the chat repository.
    pub fn chat_repo(&self) -> &C {
        &self.chat_repo
    }

    /// Create and persist a fresh session.
    pub async fn create_session(&self) -> Result<Session, RepositoryError> {
        let session = self.chat_repo.create_session(&Session::new()).await?;
        debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        self.chat_repo.get_session(session_id).await
    }

    /// Append a message and return the stored record.
    pub async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = ChatMessage::new(session_id, role, content);
        self.chat_repo.save_message(&message).await?;
        Ok(message)
    }

    /// Up to `limit` most recent messages, oldest-first.
    pub async fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.chat_repo.recent_messages(session_id, limit).await
    }

    /// Up to `limit` most recent non-system messages preceding `current`,
    /// oldest-first.
    ///
    /// `current` has already been persisted; it is read back with the rest
    /// and dropped here so it is never replayed as its own history.
    pub async fn history_before(
        &self,
        current: &ChatMessage,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut messages = self
            .chat_repo
            .recent_dialogue(&current.session_id, limit.saturating_add(1))
            .await?;
        messages.retain(|m| m.id != current.id);
        let excess = messages.len().saturating_sub(limit as usize);
        messages.drain(..excess);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryChatRepository;

    #[tokio::test]
    async fn history_excludes_current_message() {
        let service = ChatService::new(InMemoryChatRepository::default());
        let session = service.create_session().await.unwrap();

        for i in 0..5 {
            service
                .append_message(session.id, MessageRole::User, &format!("m{i}"))
                .await
                .unwrap();
        }
        let current = service
            .append_message(session.id, MessageRole::User, "current")
            .await
            .unwrap();

        let history = service.history_before(&current, 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn system_rows_do_not_shrink_the_window() {
        let service = ChatService::new(InMemoryChatRepository::default());
        let session = service.create_session().await.unwrap();

        for (role, content) in [
            (MessageRole::User, "q1"),
            (MessageRole::Assistant, "a1"),
            (MessageRole::System, "note"),
            (MessageRole::User, "q2"),
            (MessageRole::System, "note"),
        ] {
            service.append_message(session.id, role, content).await.unwrap();
        }
        let current = service
            .append_message(session.id, MessageRole::User, "current")
            .await
            .unwrap();

        let history = service.history_before(&current, 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);
    }

    #[tokio::test]
    async fn zero_window_returns_nothing() {
        let service = ChatService::new(InMemoryChatRepository::default());
        let session = service.create_session().await.unwrap();
        let current = service
            .append_message(session.id, MessageRole::User, "only")
            .await
            .unwrap();
        assert!(service.history_before(&current, 0).await.unwrap().is_empty());
        assert!(service.recent_messages(&session.id, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_to_missing_session_fails() {
        let service = ChatService::new(InMemoryChatRepository::default());
        let err = service
            .append_message(Uuid::now_v7(), MessageRole::User, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
