use std::path::Path;
use std::sync::Arc;

use sqlx::migrate::Migrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultpay::adapters::PostgresStore;
use vaultpay::config::Config;
use vaultpay::db;
use vaultpay::gateway::{CircuitBreaker, GatewayClient, GatewayConfig};
use vaultpay::services::{PaymentService, WalletService};
use vaultpay::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("database migrations completed");

    let store = Arc::new(PostgresStore::new(pool.clone()));
    let breaker = Arc::new(CircuitBreaker::new(
        config.gateway.circuit_breaker_failures,
        config.gateway.circuit_breaker_cooldown,
    ));
    let gateway = Arc::new(GatewayClient::new(
        GatewayConfig {
            base_url: config.gateway.url.clone(),
            timeout: config.gateway.timeout,
            max_retries: config.gateway.max_retries,
            retry_initial_backoff: config.gateway.retry_initial_backoff,
            retry_max_backoff: config.gateway.retry_max_backoff,
            max_in_flight: config.gateway.max_in_flight,
        },
        breaker,
    ));

    let payments = PaymentService::new(store.clone(), store.clone(), gateway);
    let wallets = WalletService::new(store.clone(), store.clone());

    let state = AppState {
        db: pool,
        payments,
        wallets,
        api_key: config.api_key.clone(),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
