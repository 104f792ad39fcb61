//! ChatService: the request-path operations behind the HTTP handlers.
//!
//! Validates input, talks to the store, and hands user messages to the
//! delivery queue. Nothing here waits for the persona: a user message is
//! stored and acknowledged, and the reply arrives later through polling.

use std::sync::Arc;

use marianna_types::chat::{Conversation, Message, NewMessage, Sender};
use marianna_types::error::ChatError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::delivery::queue::{TurnQueue, TurnRequest};

use super::repository::ConversationStore;

/// Longest accepted reaction token, in chars (covers multi-codepoint emoji).
const MAX_REACTION_CHARS: usize = 32;

pub struct ChatService<S: ConversationStore> {
    store: Arc<S>,
    turns: TurnQueue,
}

impl<S: ConversationStore> ChatService<S> {
    pub fn new(store: Arc<S>, turns: TurnQueue) -> Self {
        Self { store, turns }
    }

    /// Direct access to the underlying store (used by status reporting).
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.store.list_conversations().await?)
    }

    pub async fn get_conversation(&self, id: &Uuid) -> Result<Conversation, ChatError> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or(ChatError::ConversationNotFound(*id))
    }

    pub async fn create_conversation(&self, title: &str) -> Result<Conversation, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::Validation("title must not be empty".to_string()));
        }

        let conversation = self.store.create_conversation(title).await?;
        info!(conversation_id = %conversation.id, "conversation created");
        Ok(conversation)
    }

    /// Delete a conversation and its messages. Unknown ids succeed.
    pub async fn delete_conversation(&self, id: &Uuid) -> Result<(), ChatError> {
        self.store.delete_conversation(id).await?;
        info!(conversation_id = %id, "conversation deleted");
        Ok(())
    }

    /// Messages in timestamp order; empty for unknown conversations.
    pub async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, ChatError> {
        Ok(self.store.list_messages(conversation_id).await?)
    }

    /// Store a message and, when the user sent it, queue a persona turn.
    ///
    /// Returns as soon as the message is stored. A full or closed delivery
    /// queue is logged; the stored message is still returned.
    pub async fn send_message(&self, new: NewMessage) -> Result<Message, ChatError> {
        if new.content.trim().is_empty() && new.media.is_none() {
            return Err(ChatError::Validation(
                "message needs text content or a media file".to_string(),
            ));
        }
        self.get_conversation(&new.conversation_id).await?;

        let message = self.store.append_message(new).await?;

        if message.sender == Sender::User {
            let turn = TurnRequest {
                conversation_id: message.conversation_id,
                message_id: message.id,
                content: message.content.clone(),
                media: message.media.clone(),
            };
            if let Err(e) = self.turns.submit(turn) {
                warn!(
                    conversation_id = %message.conversation_id,
                    message_id = %message.id,
                    error = %e,
                    "persona turn not queued"
                );
            }
        }
        Ok(message)
    }

    pub async fn add_reaction(&self, message_id: &Uuid, token: &str) -> Result<Message, ChatError> {
        let token = validate_reaction(token)?;
        self.store
            .add_reaction(message_id, token)
            .await?
            .ok_or(ChatError::MessageNotFound(*message_id))
    }

    pub async fn remove_reaction(&self, message_id: &Uuid, token: &str) -> Result<Message, ChatError> {
        let token = validate_reaction(token)?;
        self.store
            .remove_reaction(message_id, token)
            .await?
            .ok_or(ChatError::MessageNotFound(*message_id))
    }
}

fn validate_reaction(token: &str) -> Result<&str, ChatError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ChatError::Validation("reaction must not be empty".to_string()));
    }
    if token.chars().count() > MAX_REACTION_CHARS {
        return Err(ChatError::Validation(format!(
            "reaction must be at most {MAX_REACTION_CHARS} characters"
        )));
    }
    Ok(token)
}
