use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use wren_types::api::{FriendView, PendingRequestView};

use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct FriendsQuery {
    #[serde(default)]
    pub online: bool,
}

pub async fn list_friends(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Query(query): Query<FriendsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.friends_of(user_id, query.online))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("friends read for user {} failed: {:#}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let friends: Vec<FriendView> = rows
        .into_iter()
        .map(|row| FriendView {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_online: row.is_online,
        })
        .collect();

    Ok(Json(friends))
}

pub async fn pending_requests(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.pending_requests_for(user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("pending requests read for user {} failed: {:#}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let requests: Vec<PendingRequestView> = rows
        .into_iter()
        .map(|row| PendingRequestView {
            id: row.id,
            sender_id: row.sender_id,
            sender_username: row.sender_username,
            sender_first_name: row.sender_first_name,
            sender_last_name: row.sender_last_name,
        })
        .collect();

    Ok(Json(requests))
}
