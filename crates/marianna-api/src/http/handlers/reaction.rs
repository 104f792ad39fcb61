//! Reaction HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/messages/{id}/reactions            - Add a reaction token
//! - DELETE /api/messages/{id}/reactions/{reaction} - Remove a reaction token
//!
//! Reactions have set semantics: adding twice or removing an absent token
//! leaves the message unchanged. Both return the updated message.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use marianna_types::chat::Message;

use crate::http::error::AppError;
use crate::state::AppState;

use super::parse_uuid;

/// Request body for adding a reaction.
#[derive(Debug, Deserialize)]
pub struct AddReactionRequest {
    #[serde(default)]
    pub reaction: String,
}

/// POST /api/messages/{id}/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddReactionRequest>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let message_id = parse_uuid(&id)?;
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let message = state
        .chat_service
        .add_reaction(&message_id, &request.reaction)
        .await?;
    Ok(Json(message))
}

/// DELETE /api/messages/{id}/reactions/{reaction}
pub async fn remove_reaction(
    State(state): State<AppState>,
    Path((id, reaction)): Path<(String, String)>,
) -> Result<Json<Message>, AppError> {
    let message_id = parse_uuid(&id)?;
    let message = state
        .chat_service
        .remove_reaction(&message_id, &reaction)
        .await?;
    Ok(Json(message))
}
