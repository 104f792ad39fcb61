//! Message HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/conversations/{id}/messages - Messages in timestamp order (polled by the client)
//! - POST /api/conversations/{id}/messages - Store a message, optionally with media
//!
//! Posting a user message only stores it and queues the persona turn; the
//! AI fragments show up in later polls.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use marianna_types::chat::{Message, NewMessage, Sender};

use crate::http::error::AppError;
use crate::state::AppState;

use super::parse_uuid;

/// Response body for a stored message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResponse {
    pub user_message: Message,
}

/// File part of the form, held in memory until validated.
struct UploadPart {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Raw multipart fields before validation.
#[derive(Default)]
struct MessageForm {
    content: String,
    sender: Option<String>,
    reply_to_id: Option<String>,
    ai_avatar: Option<String>,
    media: Option<UploadPart>,
}

impl MessageForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut form = MessageForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "content" => form.content = field.text().await?,
                "sender" => form.sender = Some(field.text().await?),
                "replyToId" => form.reply_to_id = non_blank(field.text().await?),
                "aiAvatar" => form.ai_avatar = non_blank(field.text().await?),
                "media" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?.to_vec();
                    // Browsers send an empty part when no file was picked.
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        form.media = Some(UploadPart {
                            file_name,
                            content_type,
                            bytes,
                        });
                    }
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// GET /api/conversations/{id}/messages
///
/// An unknown conversation, or an id that is not a UUID at all, yields an
/// empty list so polling never errors.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    let Ok(id) = parse_uuid(&id) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.chat_service.list_messages(&id).await?))
}

/// POST /api/conversations/{id}/messages
///
/// Everything is validated before the upload touches disk. If storing the
/// message fails afterwards, the saved file is removed again.
pub async fn create_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateMessageResponse>), AppError> {
    let conversation_id = parse_uuid(&id)?;
    let form = MessageForm::read(&mut multipart).await?;

    let sender = form
        .sender
        .as_deref()
        .ok_or_else(|| AppError::Validation("sender is required".to_string()))?
        .parse::<Sender>()
        .map_err(AppError::Validation)?;
    let reply_to_id = form.reply_to_id.as_deref().map(parse_uuid).transpose()?;

    if form.content.trim().is_empty() && form.media.is_none() {
        return Err(AppError::Validation(
            "message needs text content or a media file".to_string(),
        ));
    }
    if let Some(upload) = &form.media {
        state
            .uploads
            .validate(&upload.file_name, &upload.content_type, upload.bytes.len())?;
    }
    state.chat_service.get_conversation(&conversation_id).await?;

    let media = match &form.media {
        Some(upload) => Some(
            state
                .uploads
                .save(&upload.file_name, &upload.content_type, &upload.bytes)
                .await?,
        ),
        None => None,
    };

    let new = NewMessage {
        conversation_id,
        content: form.content,
        sender,
        media: media.clone(),
        ai_avatar: form.ai_avatar,
        reply_to_id,
    };

    match state.chat_service.send_message(new).await {
        Ok(user_message) => Ok((
            StatusCode::CREATED,
            Json(CreateMessageResponse { user_message }),
        )),
        Err(e) => {
            if let Some(media) = &media {
                state.uploads.remove(media).await;
            }
            Err(e.into())
        }
    }
}
