//! Conversation HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/conversations      - List conversations, most recently active first
//! - POST   /api/conversations      - Create a conversation
//! - DELETE /api/conversations/{id} - Delete a conversation and all its messages

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use marianna_types::chat::Conversation;

use crate::http::error::AppError;
use crate::state::AppState;

use super::parse_uuid;

/// Request body for creating a conversation.
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: String,
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(state.chat_service.list_conversations().await?))
}

/// POST /api/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let conversation = state.chat_service.create_conversation(&request.title).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// DELETE /api/conversations/{id}
///
/// Deleting an id that does not exist still succeeds.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_uuid(&id)?;
    state.chat_service.delete_conversation(&id).await?;
    Ok(Json(serde_json::json!({
        "message": "Conversation deleted successfully",
    })))
}
