//! Conversation history adapter
//!
//! Wraps the relational store's message table into per-channel histories
//! ready to be dropped into a prompt.

use crate::db::RelationalStore;
use crate::errors::Result;
use crate::models::{Channel, ConversationMessage, NewMessage, Role};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ConversationLog {
    store: Arc<dyn RelationalStore>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Append one message. Store failures propagate unchanged.
    pub async fn append(&self, message: NewMessage) -> Result<ConversationMessage> {
        self.store.append_message(message).await
    }

    /// Record a question and its answer together; a failure stores neither
    pub async fn record_exchange(&self, user: NewMessage, assistant: NewMessage) -> Result<()> {
        let project_id = user.project_id;
        let channel = user.channel;
        self.store.append_exchange(user, assistant).await?;

        debug!(project_id, %channel, "Recorded exchange");
        Ok(())
    }

    /// The most recent `limit` messages of `channel`, oldest first
    pub async fn history(
        &self,
        project_id: i64,
        channel: Channel,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>> {
        let mut messages = self
            .store
            .recent_messages(project_id, channel, limit)
            .await?;
        messages.reverse();

        debug!(project_id, %channel, count = messages.len(), "Loaded history");
        Ok(messages)
    }

    /// Render history as alternating `User:`/`Assistant:` paragraphs
    pub fn render(messages: &[ConversationMessage]) -> String {
        let mut out = String::new();
        for message in messages {
            let speaker = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(speaker);
            out.push_str(": ");
            out.push_str(&message.content);
            out.push_str("\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    async fn seeded() -> (ConversationLog, i64) {
        let store = Arc::new(MemoryStore::new());
        let project = store.create_project("p".into(), None).await.unwrap();
        (ConversationLog::new(store), project.id)
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_bounded() {
        let (log, project_id) = seeded().await;
        for i in 0..12 {
            log.append(NewMessage::user(project_id, Channel::Chat, format!("m{}", i)))
                .await
                .unwrap();
        }

        let history = tokio_test::assert_ok!(log.history(project_id, Channel::Chat, 10).await);
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().unwrap().content, "m2");
        assert_eq!(history.last().unwrap().content, "m11");
    }

    #[tokio::test]
    async fn test_channels_are_separate() {
        let (log, project_id) = seeded().await;
        log.append(NewMessage::user(project_id, Channel::Chat, "hello"))
            .await
            .unwrap();
        log.append(NewMessage::user(project_id, Channel::Research, "[Deep Research] gaps"))
            .await
            .unwrap();

        let chat = log.history(project_id, Channel::Chat, 10).await.unwrap();
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].content, "hello");

        let research = log.history(project_id, Channel::Research, 10).await.unwrap();
        assert_eq!(research.len(), 1);
        assert!(research[0].content.starts_with("[Deep Research]"));
    }

    #[tokio::test]
    async fn test_record_exchange_keeps_turn_order() {
        let (log, project_id) = seeded().await;
        log.record_exchange(
            NewMessage::user(project_id, Channel::Research, "[Deep Research] gaps"),
            NewMessage::assistant(project_id, Channel::Research, "report"),
        )
        .await
        .unwrap();

        let history = log.history(project_id, Channel::Research, 10).await.unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert!(log.history(project_id, Channel::Chat, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_formats_turns() {
        let (log, project_id) = seeded().await;
        log.append(NewMessage::user(project_id, Channel::Chat, "Q"))
            .await
            .unwrap();
        log.append(NewMessage::assistant(project_id, Channel::Chat, "A"))
            .await
            .unwrap();

        let history = log.history(project_id, Channel::Chat, 10).await.unwrap();
        assert_eq!(ConversationLog::render(&history), "User: Q\n\nAssistant: A\n\n");
        assert_eq!(ConversationLog::render(&[]), "");
    }
}
