//! Outbox relay worker.
//!
//! Periodically drains pending outbox rows, publishes them with confirms,
//! and marks them sent. Delivery is at-least-once: a row is only marked sent
//! after a confirmed publish, and a failed mark leaves it for the next tick,
//! so consumers must dedupe on the event id.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;

use crate::db::models::OutboxEvent;
use crate::error::AppError;
use crate::outbox::EVENTS_EXCHANGE;
use crate::ports::{EventPublisher, OutboxStore};

#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// How often pending rows are drained.
    pub tick: Duration,
    pub batch_size: i64,
    pub max_in_flight: usize,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            tick: Duration::from_secs(1),
            batch_size: 100,
            max_in_flight: 10,
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    cfg: RelayConfig,
}

impl Relay {
    pub fn new(store: Arc<dyn OutboxStore>, publisher: Arc<dyn EventPublisher>, cfg: RelayConfig) -> Self {
        Relay {
            store,
            publisher,
            cfg,
        }
    }

    /// Runs the drain loop until the task is cancelled. A tick that finds the
    /// previous batch still in flight is skipped rather than stacked.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.cfg.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            batch_size = self.cfg.batch_size,
            max_in_flight = self.cfg.max_in_flight,
            "outbox relay started"
        );

        loop {
            interval.tick().await;
            match self.process_once().await {
                Ok(published) => {
                    if published > 0 {
                        tracing::debug!(published, "outbox relay processed batch");
                    }
                }
                Err(err) => tracing::error!(error = %err, "outbox relay tick failed"),
            }
        }
    }

    /// Publishes one batch of pending events. Events fan out concurrently up
    /// to `max_in_flight`; the batch settles before returning. Returns the
    /// number of events confirmed and marked sent.
    pub async fn process_once(&self) -> Result<usize, AppError> {
        let events = self.store.pending_events(self.cfg.batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(self.cfg.max_in_flight.max(1)));
        let mut handles = Vec::with_capacity(events.len());

        for event in events {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AppError::internal("relay semaphore closed"))?;
            let relay = self.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                relay.publish_with_retry(&event).await?;
                relay.store.mark_sent(event.id).await
            }));
        }

        let mut sent = 0usize;
        let mut first_err: Option<AppError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => sent += 1,
                Ok(Err(err)) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(AppError::internal(format!(
                            "relay publish task panicked: {err}"
                        )));
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(sent),
        }
    }

    async fn publish_with_retry(&self, event: &OutboxEvent) -> Result<(), AppError> {
        let payload = serde_json::to_vec(&event.payload)
            .map_err(|e| AppError::internal(format!("encode outbox payload: {e}")))?;

        let mut backoff = self.cfg.initial_backoff;
        let mut last_err: Option<AppError> = None;

        for attempt in 0..=self.cfg.max_retries {
            match self
                .publisher
                .publish(EVENTS_EXCHANGE, &event.event_type, &payload)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        attempt,
                        error = %err,
                        "outbox publish failed"
                    );
                    last_err = Some(err);
                }
            }

            if attempt == self.cfg.max_retries {
                break;
            }
            tokio::time::sleep(backoff).await;
            backoff = next_backoff(backoff, self.cfg.max_backoff);
        }

        Err(last_err
            .unwrap_or_else(|| AppError::internal(format!("failed to publish outbox event {}", event.id))))
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    let next = current.saturating_mul(2);
    if next > max {
        max
    } else {
        next
    }
}
