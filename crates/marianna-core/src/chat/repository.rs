//! ConversationStore trait definition.
//!
//! Provides CRUD operations for conversations, their messages, and the
//! reaction set of each message. Uses the RPITIT pattern so concrete stores
//! stay zero-cost; [`super::box_store::BoxConversationStore`] erases the type
//! when the store is chosen at runtime.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use marianna_types::chat::{Conversation, Message, NewMessage};
use marianna_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// Implementations: [`super::memory::InMemoryConversationStore`] here and
/// `SqliteConversationStore` in marianna-infra.
pub trait ConversationStore: Send + Sync {
    /// All conversations, most recently updated first.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Get a conversation by its unique ID.
    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Create a conversation with a fresh id and `created_at == updated_at`.
    fn create_conversation(
        &self,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Delete a conversation and every message in it. Absent ids are a no-op.
    fn delete_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages of a conversation ordered by timestamp ascending.
    ///
    /// Unknown conversations yield an empty list, not an error.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Persist a message, assigning id, timestamp, and an empty reaction set,
    /// and advance the conversation's `updated_at` to the message timestamp.
    ///
    /// Fails with [`RepositoryError::NotFound`] when the conversation does
    /// not exist (e.g. it was deleted while a turn was in flight).
    fn append_message(
        &self,
        message: NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Add a reaction token to a message. Idempotent.
    ///
    /// Returns `None` when the message does not exist.
    fn add_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Remove a reaction token from a message. Removing an absent token is a no-op.
    ///
    /// Returns `None` when the message does not exist.
    fn remove_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Count all conversations.
    fn count_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count all messages across conversations.
    fn count_messages(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Timestamp for the next message of a conversation.
///
/// Truncated to microseconds (the precision both stores persist) and forced
/// strictly past the conversation's latest message, so appends landing in the
/// same clock tick still order deterministically.
pub fn next_message_timestamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match last {
        Some(last) if now <= last => last + TimeDelta::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_timestamp_uses_now_when_ahead() {
        let last = Utc::now() - TimeDelta::seconds(5);
        let now = Utc::now();
        assert_eq!(next_message_timestamp(now, Some(last)), now.trunc_subsecs(6));
    }

    #[test]
    fn test_next_timestamp_bumps_past_last() {
        let now = Utc::now().trunc_subsecs(6);
        let next = next_message_timestamp(now, Some(now));
        assert_eq!(next, now + TimeDelta::microseconds(1));

        // Clock went backwards.
        let earlier = now - TimeDelta::milliseconds(3);
        assert!(next_message_timestamp(earlier, Some(now)) > now);
    }

    #[test]
    fn test_next_timestamp_without_history() {
        let now = Utc::now();
        assert_eq!(next_message_timestamp(now, None), now.trunc_subsecs(6));
    }
}
