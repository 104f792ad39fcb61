//! SQLite conversation store implementation.
//!
//! Implements `ConversationStore` from `marianna-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool, and every mutation in a writer-pool transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use marianna_core::chat::repository::{next_message_timestamp, ConversationStore};
use marianna_types::chat::{Conversation, MediaKind, MediaRef, Message, NewMessage, Sender};
use marianna_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationStore`.
pub struct SqliteConversationStore {
    pool: DatabasePool,
}

impl SqliteConversationStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Load a message inside the writer transaction, let `apply` change its
    /// reaction set, and write the set back when it changed.
    async fn update_reactions(
        &self,
        message_id: &Uuid,
        apply: impl FnOnce(&mut Message) -> bool,
    ) -> Result<Option<Message>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(message_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut message = MessageRow::from_row(&row).map_err(db_err)?.into_message()?;

        if apply(&mut message) {
            let reactions = serde_json::to_string(&message.reactions)
                .map_err(|e| RepositoryError::Query(format!("failed to encode reactions: {e}")))?;
            sqlx::query("UPDATE messages SET reactions = ? WHERE id = ?")
                .bind(reactions)
                .bind(message_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Some(message))
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        Ok(Conversation {
            id: parse_uuid(&self.id, "conversation id")?,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    content: String,
    sender: String,
    media_url: Option<String>,
    media_type: Option<String>,
    timestamp: String,
    reactions: String,
    ai_avatar: Option<String>,
    reply_to_id: Option<String>,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            content: row.try_get("content")?,
            sender: row.try_get("sender")?,
            media_url: row.try_get("media_url")?,
            media_type: row.try_get("media_type")?,
            timestamp: row.try_get("timestamp")?,
            reactions: row.try_get("reactions")?,
            ai_avatar: row.try_get("ai_avatar")?,
            reply_to_id: row.try_get("reply_to_id")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let sender: Sender = self
            .sender
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let media = match (self.media_url, self.media_type) {
            (Some(url), Some(kind)) => {
                let kind: MediaKind = kind.parse().map_err(|e: String| RepositoryError::Query(e))?;
                Some(MediaRef { url, kind })
            }
            _ => None,
        };

        let reactions: Vec<String> = serde_json::from_str(&self.reactions)
            .map_err(|e| RepositoryError::Query(format!("invalid reactions: {e}")))?;

        Ok(Message {
            id: parse_uuid(&self.id, "message id")?,
            conversation_id: parse_uuid(&self.conversation_id, "conversation_id")?,
            content: self.content,
            sender,
            media,
            timestamp: parse_datetime(&self.timestamp)?,
            reactions,
            ai_avatar: self.ai_avatar,
            reply_to_id: self
                .reply_to_id
                .as_deref()
                .map(|id| parse_uuid(id, "reply_to_id"))
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn db_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => RepositoryError::Connection,
        other => RepositoryError::Query(other.to_string()),
    }
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width form so that string order in SQL matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ConversationStore implementation
// ---------------------------------------------------------------------------

impl ConversationStore for SqliteConversationStore {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY updated_at DESC, id DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(db_err)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row).map_err(db_err)?;
            conversations.push(conversation_row.into_conversation()?);
        }
        Ok(conversations)
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(db_err)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, RepositoryError> {
        let now = next_message_timestamp(Utc::now(), None);
        let conversation = Conversation {
            id: Uuid::now_v7(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO conversations (id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.title)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(db_err)?;

        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &Uuid) -> Result<(), RepositoryError> {
        // Messages go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(db_err)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row = MessageRow::from_row(row).map_err(db_err)?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }

    async fn append_message(&self, new: NewMessage) -> Result<Message, RepositoryError> {
        let conversation_id = new.conversation_id.to_string();
        let mut tx = self.pool.writer.begin().await.map_err(db_err)?;

        let exists = sqlx::query("SELECT 1 FROM conversations WHERE id = ?")
            .bind(&conversation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let last: Option<String> =
            sqlx::query_scalar("SELECT MAX(timestamp) FROM messages WHERE conversation_id = ?")
                .bind(&conversation_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
        let last = last.as_deref().map(parse_datetime).transpose()?;

        let message = Message {
            id: Uuid::now_v7(),
            conversation_id: new.conversation_id,
            content: new.content,
            sender: new.sender,
            media: new.media,
            timestamp: next_message_timestamp(Utc::now(), last),
            reactions: Vec::new(),
            ai_avatar: new.ai_avatar,
            reply_to_id: new.reply_to_id,
        };
        let timestamp = format_datetime(&message.timestamp);

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, content, sender, media_url, media_type, timestamp, reactions, ai_avatar, reply_to_id)
               VALUES (?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(&conversation_id)
        .bind(&message.content)
        .bind(message.sender.to_string())
        .bind(message.media.as_ref().map(|m| m.url.clone()))
        .bind(message.media.as_ref().map(|m| m.kind.to_string()))
        .bind(&timestamp)
        .bind(&message.ai_avatar)
        .bind(message.reply_to_id.map(|id| id.to_string()))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ? AND updated_at < ?")
            .bind(&timestamp)
            .bind(&conversation_id)
            .bind(&timestamp)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(message)
    }

    async fn add_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.update_reactions(message_id, |message| message.add_reaction(token))
            .await
    }

    async fn remove_reaction(
        &self,
        message_id: &Uuid,
        token: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.update_reactions(message_id, |message| message.remove_reaction(token))
            .await
    }

    async fn count_conversations(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn count_messages(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }
}
