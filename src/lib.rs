pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod outbox;
pub mod ports;
pub mod services;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::services::{PaymentService, WalletService};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub payments: PaymentService,
    pub wallets: WalletService,
    pub api_key: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route(
            "/wallets",
            get(handlers::wallets::list_wallets).post(handlers::wallets::create_wallet),
        )
        .route(
            "/wallets/:user_id/balance",
            get(handlers::wallets::get_balance),
        )
        .route(
            "/wallets/:user_id/transactions",
            get(handlers::wallets::list_transactions),
        )
        .route("/wallets/:user_id/top-up", post(handlers::wallets::top_up))
        .route(
            "/wallets/:user_id/payments",
            post(handlers::payments::create_payment),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth::api_key_auth))
        .layer(from_fn(middleware::request_id::request_id))
        .with_state(state)
}
