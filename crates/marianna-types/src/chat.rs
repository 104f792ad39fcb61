//! Conversation and message types for Marianna.
//!
//! These types model the chat between the user and the persona:
//! conversations, the messages inside them, attached media, and reactions.
//! The JSON shape is camelCase and flat because the web client polls it
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who authored a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender IN ('user', 'ai'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "ai" => Ok(Sender::Ai),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify an uploaded file by its MIME type.
    ///
    /// Anything under `image/` is an image; everything else that made it
    /// past upload validation is a video.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("invalid media kind: '{other}'")),
        }
    }
}

/// A reference to a persisted media file (`/uploads/<file>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "mediaUrl")]
    pub url: String,
    #[serde(rename = "mediaType")]
    pub kind: MediaKind,
}

/// A conversation between the user and the persona.
///
/// `updated_at` advances every time a message is appended, so listing by
/// `updated_at` descending puts the most recently active chat first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a conversation.
///
/// Messages are ordered by `timestamp` within a conversation. The store
/// guarantees that timestamps strictly increase per conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Text body; empty when the message is media-only.
    pub content: String,
    pub sender: Sender,
    /// Flattened into `mediaUrl` / `mediaType`; both keys absent when `None`.
    #[serde(flatten)]
    pub media: Option<MediaRef>,
    pub timestamp: DateTime<Utc>,
    /// Reaction tokens with set semantics (no duplicates, insertion order kept).
    #[serde(default)]
    pub reactions: Vec<String>,
    /// Persona avatar shown next to this message (free-form short string).
    pub ai_avatar: Option<String>,
    /// Message in the same conversation this one replies to (advisory).
    pub reply_to_id: Option<Uuid>,
}

impl Message {
    /// Add a reaction token. Returns `false` if it was already present.
    pub fn add_reaction(&mut self, token: &str) -> bool {
        if self.reactions.iter().any(|r| r == token) {
            return false;
        }
        self.reactions.push(token.to_string());
        true
    }

    /// Remove a reaction token. Returns `false` if it was not present.
    pub fn remove_reaction(&mut self, token: &str) -> bool {
        let before = self.reactions.len();
        self.reactions.retain(|r| r != token);
        self.reactions.len() != before
    }
}

/// Insert shape for a message: everything the caller decides.
///
/// The store assigns `id`, `timestamp`, and an empty reaction set.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub media: Option<MediaRef>,
    pub ai_avatar: Option<String>,
    pub reply_to_id: Option<Uuid>,
}

impl NewMessage {
    /// A persona fragment: AI sender, no media, no reply reference.
    pub fn ai_fragment(conversation_id: Uuid, content: String, ai_avatar: Option<String>) -> Self {
        Self {
            conversation_id,
            content,
            sender: Sender::Ai,
            media: None,
            ai_avatar,
            reply_to_id: None,
        }
    }
}
