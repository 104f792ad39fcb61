//! BoxConversationStore -- object-safe dynamic dispatch wrapper for ConversationStore.
//!
//! Same shape as `BoxLlmProvider`: an object-safe `ConversationStoreDyn`
//! trait with boxed futures, a blanket impl for every `ConversationStore`,
//! and a wrapper that delegates. The wrapper itself implements
//! `ConversationStore`, so generic services accept it unchanged.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use marianna_types::chat::{Conversation, Message, NewMessage};
use marianna_types::error::RepositoryError;
use uuid::Uuid;

use super::repository::ConversationStore;

type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`ConversationStore`] with boxed futures.
pub trait ConversationStoreDyn: Send + Sync {
    fn list_conversations_boxed(&self) -> StoreFuture<'_, Vec<Conversation>>;
    fn get_conversation_boxed<'a>(&'a self, id: &'a Uuid) -> StoreFuture<'a, Option<Conversation>>;
    fn create_conversation_boxed<'a>(&'a self, title: &'a str) -> StoreFuture<'a, Conversation>;
    fn delete_conversation_boxed<'a>(&'a self, id: &'a Uuid) -> StoreFuture<'a, ()>;
    fn list_messages_boxed<'a>(&'a self, conversation_id: &'a Uuid) -> StoreFuture<'a, Vec<Message>>;
    fn append_message_boxed(&self, message: NewMessage) -> StoreFuture<'_, Message>;
    fn add_reaction_boxed<'a>(
        &'a self,
        message_id: &'a Uuid,
        token: &'a str,
    ) -> StoreFuture<'a, Option<Message>>;
    fn remove_reaction_boxed<'a>(
        &'a self,
        message_id: &'a Uuid,
        token: &'a str,
    ) -> StoreFuture<'a, Option<Message>>;
    fn count_conversations_boxed(&self) -> StoreFuture<'_, u64>;
    fn count_messages_boxed(&self) -> StoreFuture<'_, u64>;
}

impl<T: ConversationStore> ConversationStoreDyn for T {
    fn list_conversations_boxed(&self) -> StoreFuture<'_, Vec<Conversation>> {
        Box::pin(self.list_conversations())
    }

    fn get_conversation_boxed<'a>(&'a self, id: &'a Uuid) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(self.get_conversation(id))
    }

    fn create_conversation_boxed<'a>(&'a self, title: &'a str) -> StoreFuture<'a, Conversation> {
        Box::pin(self.create_conversation(title))
    }

    fn delete_conversation_boxed<'a>(&'a self, id: &'a Uuid) -> StoreFuture<'a, ()> {
        Box::pin(self.delete_conversation(id))
    }

    fn list_messages_boxed<'a>(&'a self, conversation_id: &'a Uuid) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(self.list_messages(conversation_id))
    }

    fn append_message_boxed(&self, message: NewMessage) -> StoreFuture<'_, Message> {
        Box::pin(self.append_message(message))
    }

    fn add_reaction_boxed<'a>(
        &'a self,
        message_id: &'a Uuid,
        token: &'a str,
    ) -> StoreFuture<'a, Option<Message>> {
        Box::pin(self.add_reaction(message_id, token))
    }

    fn remove_reaction_boxed<'a>(
        &'a self,
        message_id: &'a Uuid,
        token: &'a str,
    ) -> StoreFuture<'a, Option<Message>> {
        Box::pin(self.remove_reaction(message_id, token))
    }

    fn count_conversations_boxed(&self) -> StoreFuture<'_, u64> {
        Box::pin(self.count_conversations())
    }

    fn count_messages_boxed(&self) -> StoreFuture<'_, u64> {
        Box::pin(self.count_messages())
    }
}

/// Type-erased conversation store, chosen once at process init.
///
/// Cheap to clone: clones share the same underlying store.
#[derive(Clone)]
pub struct BoxConversationStore {
    inner: Arc<dyn ConversationStoreDyn>,
}

impl BoxConversationStore {
    /// Wrap a concrete `ConversationStore` in a type-erased box.
    pub fn new<T: ConversationStore + 'static>(store: T) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl ConversationStore for BoxConversationStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
        self.inner.list_conversations_boxed().await
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        self.inner.get_conversation_boxed(id).await
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, RepositoryError> {
        self.inner.create_conversation_boxed(title).await
    }

    async fn delete_conversation(&self, id: &Uuid) -> Result<(), RepositoryError> {
        self.inner.delete_conversation_boxed(id).await
    }

    async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        self.inner.list_messages_boxed(conversation_id).await
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        self.inner.append_message_boxed(message).await
    }

    async fn add_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.inner.add_reaction_boxed(message_id, token).await
    }

    async fn remove_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.inner.remove_reaction_boxed(message_id, token).await
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        self.inner.count_conversations_boxed().await
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        self.inner.count_messages_boxed().await
    }
}
