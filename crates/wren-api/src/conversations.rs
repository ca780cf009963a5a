use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use wren_types::api::{ConversationSummary, MarkReadRequest, MessageView};

use crate::ApiState;

pub async fn list_conversations(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.conversations_for(user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("listing conversations for user {} failed: {:#}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let summaries: Vec<ConversationSummary> = rows
        .into_iter()
        .map(|row| ConversationSummary {
            id: row.id,
            name: row.name,
            is_group: row.is_group,
            last_message: row.last_message,
        })
        .collect();

    Ok(Json(summaries))
}

pub async fn get_messages(
    State(state): State<ApiState>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.messages_in(conversation_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("reading conversation {} failed: {:#}", conversation_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let messages: Vec<MessageView> = rows
        .into_iter()
        .map(|row| MessageView {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            content: row.content,
            message_type: row.message_type,
            is_read: row.is_read,
            timestamp: row.timestamp,
        })
        .collect();

    Ok(Json(messages))
}

/// The reader flags everyone else's messages in the conversation as
/// read; their own are left alone.
pub async fn mark_read(
    State(state): State<ApiState>,
    Path(conversation_id): Path<i64>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.mark_read(conversation_id, req.user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!(
                "marking conversation {} read for user {} failed: {:#}",
                conversation_id, req.user_id, e
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}
