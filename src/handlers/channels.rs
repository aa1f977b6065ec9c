use axum::{
    extract::{Path, State},
    Json,
};

use crate::domain::Transaction;
use crate::error::AppError;
use crate::middleware::ActorId;
use crate::AppState;

pub async fn list_channel_transactions(
    State(state): State<AppState>,
    _caller: ActorId,
    Path(channel_id): Path<String>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.queries.list_by_counterparty(&channel_id).await?))
}

pub async fn first_support(
    State(state): State<AppState>,
    Path((channel_id, user_id)): Path<(String, String)>,
) -> Result<Json<Transaction>, AppError> {
    state
        .queries
        .first_support_transaction(&channel_id, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "User {} has not supported channel {}",
                user_id, channel_id
            ))
        })
}
