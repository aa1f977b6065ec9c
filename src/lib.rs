pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod ports;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::services::{TransactionLedger, TransactionQueryService};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<TransactionLedger>,
    pub queries: TransactionQueryService,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/transactions",
            get(handlers::transactions::list_my_transactions)
                .post(handlers::transactions::create_transaction),
        )
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route(
            "/channels/:id/transactions",
            get(handlers::channels::list_channel_transactions),
        )
        .route(
            "/channels/:id/supporters/:user_id/first",
            get(handlers::channels::first_support),
        )
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .with_state(state)
}
