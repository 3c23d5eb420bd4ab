//! Standalone outbox relay worker.
//!
//! Drains pending outbox rows and publishes them to RabbitMQ with confirms.
//! Runs as its own process next to the API server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::migrate::Migrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultpay::adapters::{PostgresStore, RabbitPublisher};
use vaultpay::config::{Config, RabbitSettings};
use vaultpay::db;
use vaultpay::outbox::{Relay, RelayConfig};

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

    let publisher = connect_publisher_with_retry(&config.rabbit).await?;

    let store = Arc::new(PostgresStore::new(pool));
    let relay = Relay::new(
        store,
        Arc::new(publisher),
        RelayConfig {
            tick: Duration::from_secs(1),
            batch_size: config.rabbit.relay_batch_size,
            max_in_flight: config.rabbit.relay_max_in_flight,
            max_retries: config.rabbit.relay_max_retries,
            initial_backoff: config.rabbit.relay_initial_backoff,
            max_backoff: config.rabbit.relay_max_backoff,
        },
    );

    tokio::select! {
        _ = relay.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("outbox relay shutting down");
        }
    }

    Ok(())
}

/// The broker is often the last dependency to come up; retry the initial
/// connection with the relay's own backoff settings.
async fn connect_publisher_with_retry(cfg: &RabbitSettings) -> anyhow::Result<RabbitPublisher> {
    let attempts = cfg.relay_max_retries + 1;
    let mut backoff = cfg.relay_initial_backoff;
    let mut last_err = None;

    for attempt in 0..attempts {
        match RabbitPublisher::connect(cfg).await {
            Ok(publisher) => return Ok(publisher),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "rabbitmq connect failed");
                last_err = Some(err);
            }
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff.saturating_mul(2), cfg.relay_max_backoff);
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("rabbitmq connect failed")))
}
