use thiserror::Error;
use uuid::Uuid;

/// Errors from repository operations (used by trait definitions in marianna-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to conversation and message operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors related to accepting an uploaded media file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("only images and videos are allowed (got '{0}')")]
    UnsupportedType(String),

    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("filesystem error: {0}")]
    FileSystem(String),
}
