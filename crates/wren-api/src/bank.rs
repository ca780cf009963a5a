use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use wren_db::queries::TransactionFilter;
use wren_types::api::{BalanceResponse, TransactionView};

use crate::ApiState;

pub async fn get_balance(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let balance = tokio::task::spawn_blocking(move || db.balance_of(user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("balance read for user {} failed: {:#}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(BalanceResponse { user_id, balance }))
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    /// "sent", "received", or absent for both sides of the ledger
    pub filter: Option<String>,
}

pub async fn get_transactions(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let filter = match query.filter.as_deref() {
        Some("sent") => TransactionFilter::Sent,
        Some("received") => TransactionFilter::Received,
        Some(_) => return Err(StatusCode::BAD_REQUEST),
        None => TransactionFilter::All,
    };

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.transactions_for(user_id, filter))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("ledger read for user {} failed: {:#}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let transactions: Vec<TransactionView> = rows
        .into_iter()
        .map(|row| TransactionView {
            id: row.id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            receiver_id: row.receiver_id,
            receiver_name: row.receiver_name,
            amount: row.amount,
            conversation_id: row.conversation_id,
            status: row.status,
            timestamp: row.timestamp,
        })
        .collect();

    Ok(Json(transactions))
}
