//! In-memory ConversationStore.
//!
//! Used when no database is configured. State lives behind a single
//! `tokio::sync::RwLock`, so every operation is atomic with respect to the
//! others and nothing survives a restart.

use std::collections::HashMap;

use chrono::Utc;
use marianna_types::chat::{Conversation, Message, NewMessage};
use marianna_types::error::RepositoryError;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{next_message_timestamp, ConversationStore};

#[derive(Default)]
struct State {
    conversations: HashMap<Uuid, Conversation>,
    /// Per-conversation messages, kept in timestamp order.
    messages: HashMap<Uuid, Vec<Message>>,
    /// Message id -> conversation id.
    message_index: HashMap<Uuid, Uuid>,
}

impl State {
    fn message_mut(&mut self, message_id: &Uuid) -> Option<&mut Message> {
        let conversation_id = self.message_index.get(message_id)?;
        self.messages
            .get_mut(conversation_id)?
            .iter_mut()
            .find(|m| &m.id == message_id)
    }
}

/// Conversation store backed by process memory.
#[derive(Default)]
pub struct InMemoryConversationStore {
    state: RwLock<State>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        let mut conversations: Vec<Conversation> = state.conversations.values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(conversations)
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(id).cloned())
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, RepositoryError> {
        let now = next_message_timestamp(Utc::now(), None);
        let conversation = Conversation {
            id: Uuid::now_v7(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        state.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.conversations.remove(id);
        if let Some(messages) = state.messages.remove(id) {
            for message in messages {
                state.message_index.remove(&message.id);
            }
        }
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message, RepositoryError> {
        let mut state = self.state.write().await;
        let State {
            conversations,
            messages,
            message_index,
        } = &mut *state;

        let conversation = conversations
            .get_mut(&new.conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        let thread = messages.entry(new.conversation_id).or_default();

        let timestamp = next_message_timestamp(Utc::now(), thread.last().map(|m| m.timestamp));
        let message = Message {
            id: Uuid::now_v7(),
            conversation_id: new.conversation_id,
            content: new.content,
            sender: new.sender,
            media: new.media,
            timestamp,
            reactions: Vec::new(),
            ai_avatar: new.ai_avatar,
            reply_to_id: new.reply_to_id,
        };

        thread.push(message.clone());
        message_index.insert(message.id, message.conversation_id);
        if timestamp > conversation.updated_at {
            conversation.updated_at = timestamp;
        }
        Ok(message)
    }

    async fn add_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.message_mut(message_id).map(|message| {
            message.add_reaction(token);
            message.clone()
        }))
    }

    async fn remove_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.message_mut(message_id).map(|message| {
            message.remove_reaction(token);
            message.clone()
        }))
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.read().await.conversations.len() as u64)
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        Ok(self.state.read().await.message_index.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marianna_types::chat::{MediaKind, MediaRef, Sender};

    fn user_message(conversation_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            content: content.to_string(),
            sender: Sender::User,
            media: None,
            ai_avatar: None,
            reply_to_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_conversation_sets_equal_timestamps() {
        let store = InMemoryConversationStore::new();
        let conv = store.create_conversation("Перша розмова").await.unwrap();
        assert_eq!(conv.created_at, conv.updated_at);
        assert_eq!(conv.title, "Перша розмова");

        let fetched = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(fetched, conv);
    }

    #[tokio::test]
    async fn test_append_advances_updated_at_and_reorders_listing() {
        let store = InMemoryConversationStore::new();
        let older = store.create_conversation("older").await.unwrap();
        let newer = store.create_conversation("newer").await.unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed[0].id, newer.id);

        let msg = store
            .append_message(user_message(older.id, "привіт"))
            .await
            .unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[0].updated_at, msg.timestamp);
        assert!(listed[0].updated_at >= listed[0].created_at);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let store = InMemoryConversationStore::new();
        let conv = store.create_conversation("burst").await.unwrap();

        for i in 0..50 {
            store
                .append_message(user_message(conv.id, &format!("m{i}")))
                .await
                .unwrap();
        }

        let messages = store.list_messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 50);
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        assert_eq!(messages[0].content, "m0");
        assert_eq!(messages[49].content, "m49");
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_fails() {
        let store = InMemoryConversationStore::new();
        let result = store.append_message(user_message(Uuid::now_v7(), "x")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert_eq!(store.count_messages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_messages() {
        let store = InMemoryConversationStore::new();
        let conv = store.create_conversation("gone").await.unwrap();
        let msg = store
            .append_message(user_message(conv.id, "bye"))
            .await
            .unwrap();

        store.delete_conversation(&conv.id).await.unwrap();

        assert!(store.get_conversation(&conv.id).await.unwrap().is_none());
        assert!(store.list_messages(&conv.id).await.unwrap().is_empty());
        assert!(store.add_reaction(&msg.id, "🔥").await.unwrap().is_none());
        assert_eq!(store.count_messages().await.unwrap(), 0);

        // Deleting again is a no-op.
        store.delete_conversation(&conv.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_messages_unknown_conversation_is_empty() {
        let store = InMemoryConversationStore::new();
        assert!(store.list_messages(&Uuid::now_v7()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reactions_have_set_semantics() {
        let store = InMemoryConversationStore::new();
        let conv = store.create_conversation("r").await.unwrap();
        let msg = store
            .append_message(user_message(conv.id, "look"))
            .await
            .unwrap();

        store.add_reaction(&msg.id, "🥰").await.unwrap();
        let updated = store.add_reaction(&msg.id, "🥰").await.unwrap().unwrap();
        assert_eq!(updated.reactions, vec!["🥰".to_string()]);

        let updated = store.remove_reaction(&msg.id, "💩").await.unwrap().unwrap();
        assert_eq!(updated.reactions, vec!["🥰".to_string()]);

        let updated = store.remove_reaction(&msg.id, "🥰").await.unwrap().unwrap();
        assert!(updated.reactions.is_empty());

        let listed = store.list_messages(&conv.id).await.unwrap();
        assert!(listed[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn test_reaction_on_unknown_message_returns_none() {
        let store = InMemoryConversationStore::new();
        assert!(store
            .remove_reaction(&Uuid::now_v7(), "🔥")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_append_keeps_media_avatar_and_reply() {
        let store = InMemoryConversationStore::new();
        let conv = store.create_conversation("media").await.unwrap();
        let first = store
            .append_message(user_message(conv.id, "first"))
            .await
            .unwrap();

        let stored = store
            .append_message(NewMessage {
                conversation_id: conv.id,
                content: String::new(),
                sender: Sender::User,
                media: Some(MediaRef {
                    url: "/uploads/a.png".to_string(),
                    kind: MediaKind::Image,
                }),
                ai_avatar: Some("avatar-2".to_string()),
                reply_to_id: Some(first.id),
            })
            .await
            .unwrap();

        assert_eq!(stored.reply_to_id, Some(first.id));
        assert_eq!(stored.ai_avatar.as_deref(), Some("avatar-2"));
        assert_eq!(stored.media.unwrap().kind, MediaKind::Image);
        assert!(stored.reactions.is_empty());
    }
}
