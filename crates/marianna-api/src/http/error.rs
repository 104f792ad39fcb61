//! Application error type mapping to HTTP status codes.
//!
//! Every error body has the same shape: `{ "message": ..., "code": ... }`.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use marianna_types::error::{ChatError, RepositoryError, UploadError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Conversation/message errors from the chat service.
    Chat(ChatError),
    /// Rejected or unwritable media upload.
    Upload(UploadError),
    /// Malformed or oversized multipart body.
    Multipart(MultipartError),
    /// Validation error raised by a handler.
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        AppError::Upload(e)
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Multipart(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::ConversationNotFound(_))
            | AppError::Chat(ChatError::Repository(RepositoryError::NotFound)) => (
                StatusCode::NOT_FOUND,
                "CONVERSATION_NOT_FOUND",
                "Conversation not found".to_string(),
            ),
            AppError::Chat(ChatError::MessageNotFound(_)) => (
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "Message not found".to_string(),
            ),
            AppError::Chat(ChatError::Validation(msg)) | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::Repository(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Upload(e @ UploadError::UnsupportedType(_)) => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_MEDIA", e.to_string())
            }
            AppError::Upload(e @ UploadError::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "MEDIA_TOO_LARGE", e.to_string())
            }
            AppError::Upload(e @ UploadError::FileSystem(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_FAILED", e.to_string())
            }
            AppError::Multipart(e) => {
                let code = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    "MEDIA_TOO_LARGE"
                } else {
                    "INVALID_FORM"
                };
                (e.status(), code, e.body_text())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        } else {
            tracing::debug!(code, status = status.as_u16(), error = %message, "request rejected");
        }

        (status, Json(json!({ "message": message, "code": code }))).into_response()
    }
}
