use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::domain::{TokenType, Transaction, TransactionState, TransactionType};
use crate::error::AppError;
use crate::middleware::ActorId;
use crate::services::TransferRequest;
use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransferPayload {
    pub token_type: TokenType,
    pub transaction_type: TransactionType,
    pub counterparty_id: Option<String>,
    pub amount: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub transaction_id: String,
    pub state: TransactionState,
    pub note: Option<String>,
}

/// Runs a spend for the calling user. The transfer's business outcome is
/// in `state`; a failed transfer is still `201 Created`.
///
/// Deposits credit the caller without a funds check, so they are not
/// accepted here; claims go through the operator CLI.
pub async fn create_transaction(
    State(state): State<AppState>,
    ActorId(actor_id): ActorId,
    Json(payload): Json<TransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.transaction_type != TransactionType::Withdrawal {
        return Err(AppError::Validation(
            "transaction_type: only withdrawals can be initiated over HTTP".to_string(),
        ));
    }

    let request = TransferRequest {
        actor_id,
        counterparty_id: payload.counterparty_id,
        token_type: payload.token_type,
        transaction_type: payload.transaction_type,
        amount: payload.amount,
    };

    let id = state.ledger.initiate_transfer(request).await?;
    let tx = state.ledger.get_transaction_by_id(&id).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransferResponse {
            transaction_id: tx.id,
            state: tx.state,
            note: tx.note,
        }),
    ))
}

pub async fn list_my_transactions(
    State(state): State<AppState>,
    ActorId(actor_id): ActorId,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.queries.list_by_actor(&actor_id).await?))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    ActorId(actor_id): ActorId,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.queries.get_owned(&id, &actor_id).await?))
}
