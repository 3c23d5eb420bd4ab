//! HTTP client for the external payment gateway.
//!
//! Wraps the provider's `POST /pay` endpoint with bounded concurrency, a
//! retry loop with jittered exponential backoff, and a circuit breaker.

mod breaker;

pub use breaker::CircuitBreaker;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::domain::Payment;
use crate::error::AppError;
use crate::ports::PaymentGateway;

/// Resilience settings for the gateway client. The circuit breaker is a
/// separate collaborator injected at construction so callers own its
/// lifecycle.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
    pub max_in_flight: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            base_url: "http://localhost:8081".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_initial_backoff: Duration::from_millis(200),
            retry_max_backoff: Duration::from_secs(2),
            max_in_flight: 20,
        }
    }
}

#[derive(Debug, Serialize)]
struct GatewayRequest {
    provider_id: String,
    external_reference: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    status: String,
}

#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    breaker: Arc<CircuitBreaker>,
    semaphore: Arc<Semaphore>,
}

impl GatewayClient {
    pub fn new(cfg: GatewayConfig, breaker: Arc<CircuitBreaker>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_default();

        GatewayClient {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http,
            timeout: cfg.timeout,
            max_retries: cfg.max_retries,
            initial_backoff: cfg.retry_initial_backoff,
            max_backoff: cfg.retry_max_backoff,
            breaker,
            semaphore: Arc::new(Semaphore::new(cfg.max_in_flight.max(1))),
        }
    }

    /// Single attempt against the provider, mapped per the gateway protocol:
    /// 200 -> provider status, 400 -> "declined", 504 -> timeout (retryable),
    /// anything else or an undecodable body -> gateway error (retryable),
    /// transport failure -> timeout (retryable).
    async fn attempt(&self, payload: &GatewayRequest) -> Result<String, AppError> {
        let resp = match self
            .http
            .post(format!("{}/pay", self.base_url))
            .json(payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(_) => return Err(AppError::gateway_timeout("gateway timeout")),
        };

        match resp.status() {
            StatusCode::OK => match resp.json::<GatewayResponse>().await {
                Ok(out) => Ok(out.status),
                Err(_) => Err(AppError::gateway_error("invalid gateway response")),
            },
            // The gateway refused the charge; that is a decision, not an
            // outage, so it does not count against the breaker.
            StatusCode::BAD_REQUEST => Ok("declined".to_string()),
            StatusCode::GATEWAY_TIMEOUT => Err(AppError::gateway_timeout("gateway timeout")),
            _ => Err(AppError::gateway_error("gateway error")),
        }
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn process_payment(&self, payment: &Payment) -> Result<String, AppError> {
        if !self.breaker.allow() {
            return Err(AppError::gateway_error("gateway circuit breaker open"));
        }

        // Waiting for a slot races against the call deadline.
        let _permit = match tokio::time::timeout(self.timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(AppError::internal("gateway semaphore closed")),
            Err(_) => return Err(AppError::gateway_timeout("gateway timeout")),
        };

        let payload = GatewayRequest {
            provider_id: payment.provider_id.to_string(),
            external_reference: payment.external_reference.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
        };

        let mut backoff = self.initial_backoff;
        let mut last_err: Option<AppError> = None;

        for attempt in 0..=self.max_retries {
            match self.attempt(&payload).await {
                Ok(status) => {
                    self.breaker.success();
                    return Ok(status);
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "gateway attempt failed"
                    );
                    last_err = Some(err);
                }
            }

            self.breaker.failure();

            if attempt == self.max_retries {
                break;
            }
            if !last_err.as_ref().map(AppError::is_retryable).unwrap_or(false) {
                break;
            }
            if !self.breaker.allow() {
                break;
            }

            tokio::time::sleep(jitter(backoff)).await;
            backoff = next_backoff(backoff, self.max_backoff);
        }

        Err(last_err.unwrap_or_else(|| AppError::gateway_error("gateway error")))
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

/// +/- 20% uniform jitter.
fn jitter(d: Duration) -> Duration {
    if d.is_zero() {
        return d;
    }
    let base = d.as_secs_f64();
    let delta = base * 0.2;
    let offset = rand::thread_rng().gen_range(-delta..=delta);
    Duration::from_secs_f64((base + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_backoff_doubles_until_cap() {
        let max = Duration::from_secs(2);
        let b1 = next_backoff(Duration::from_millis(200), max);
        assert_eq!(b1, Duration::from_millis(400));
        let b2 = next_backoff(Duration::from_millis(1500), max);
        assert_eq!(b2, max);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let d = Duration::from_millis(1000);
        for _ in 0..100 {
            let j = jitter(d);
            assert!(j >= Duration::from_millis(800), "jitter too low: {j:?}");
            assert!(j <= Duration::from_millis(1200), "jitter too high: {j:?}");
        }
    }

    #[test]
    fn test_jitter_of_zero_is_zero() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }
}
