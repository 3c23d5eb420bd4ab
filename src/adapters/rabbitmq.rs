//! RabbitMQ publisher with publisher confirms.
//!
//! Declares the topology on connect: durable topic exchange plus the metrics
//! and audit queues bound to `payment.*` (and `refund.*` for audit).

use async_trait::async_trait;
use lapin::{
    options::{
        BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::time::Duration;

use crate::config::RabbitSettings;
use crate::error::AppError;
use crate::ports::EventPublisher;

pub struct RabbitPublisher {
    channel: Channel,
    confirm_timeout: Duration,
}

impl RabbitPublisher {
    /// Connects, declares the topology, and enables publisher confirms on
    /// the channel.
    pub async fn connect(cfg: &RabbitSettings) -> anyhow::Result<Self> {
        let connection = Connection::connect(&cfg.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &cfg.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        if !cfg.metrics_queue.is_empty() {
            declare_and_bind(&channel, &cfg.metrics_queue, &cfg.exchange, &["payment.*"]).await?;
        }
        if !cfg.audit_queue.is_empty() {
            declare_and_bind(
                &channel,
                &cfg.audit_queue,
                &cfg.exchange,
                &["payment.*", "refund.*"],
            )
            .await?;
        }

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        Ok(RabbitPublisher {
            channel,
            confirm_timeout: cfg.publish_confirm_timeout,
        })
    }
}

async fn declare_and_bind(
    channel: &Channel,
    queue: &str,
    exchange: &str,
    routing_keys: &[&str],
) -> anyhow::Result<()> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    for key in routing_keys {
        channel
            .queue_bind(
                queue,
                exchange,
                key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }
    Ok(())
}

#[async_trait]
impl EventPublisher for RabbitPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), AppError> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| AppError::internal(format!("publish: {e}")))?;

        let confirmation = tokio::time::timeout(self.confirm_timeout, confirm)
            .await
            .map_err(|_| AppError::internal("publish confirm timeout"))?
            .map_err(|e| AppError::internal(format!("publish confirm: {e}")))?;

        if confirmation.is_nack() {
            return Err(AppError::internal("publish not acknowledged"));
        }
        Ok(())
    }
}
