pub mod channels;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::services::StoreHealth;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub stores: StoreHealth,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stores = state.ledger.store_health().await;

    let (status_code, status) = if stores.is_healthy() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stores,
    };

    (status_code, Json(body))
}
