//! Payment orchestration.
//!
//! The flow is a local saga: consult the idempotency store, debit the wallet
//! and persist the PENDING transaction with its outbox row in one database
//! transaction, call the gateway outside any lock, then settle in a second
//! transaction (status update, compensating refund, terminal events).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::models::{IdempotencyRecord, OutboxEvent};
use crate::domain::{Payment, Transaction, TxStatus, TxType};
use crate::error::AppError;
use crate::outbox::events;
use crate::ports::{IdempotencyStore, PaymentGateway, PaymentStore};

#[derive(Debug, Clone)]
pub struct ProcessPaymentRequest {
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub external_reference: String,
    pub amount: i64,
    pub currency: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPaymentResponse {
    pub transaction_id: Uuid,
    pub status: String,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        PaymentService {
            store,
            idempotency,
            gateway,
        }
    }

    pub async fn process_payment(
        &self,
        req: &ProcessPaymentRequest,
    ) -> Result<ProcessPaymentResponse, AppError> {
        // Replay a stored response before touching anything else.
        let idempotency_key = req.idempotency_key.as_deref().filter(|k| !k.is_empty());
        if let Some(key) = idempotency_key {
            if let Some(record) = self.idempotency.get(req.user_id, key).await? {
                let resp: ProcessPaymentResponse = serde_json::from_value(record.response)
                    .map_err(|_| {
                        AppError::internal("failed to decode stored idempotency response")
                    })?;
                return Ok(resp);
            }
        }

        let payment = Payment::new(
            req.user_id,
            req.provider_id,
            req.external_reference.clone(),
            req.amount,
            req.currency.clone(),
        )?;

        let tx = Transaction::new(
            req.user_id,
            TxType::Payment,
            req.amount,
            req.currency.clone(),
            req.provider_id,
            req.external_reference.clone(),
        )?;

        let created = OutboxEvent::new(
            events::PAYMENT_CREATED,
            json!({
                "transaction_id": tx.id,
                "status": TxStatus::Pending.as_str(),
            }),
        );

        // Debit + PENDING transaction + payment.created, atomically. The
        // balance row lock is released at commit, before the gateway call.
        self.store.begin_payment(&tx, &created).await?;

        let outcome = self.gateway.process_payment(&payment).await;

        let (final_status, gateway_err) = match &outcome {
            Ok(status) if status == "approved" => (TxStatus::Approved, None),
            Ok(status) if status == "declined" => (TxStatus::Declined, None),
            Ok(status) => {
                tracing::warn!(
                    transaction_id = %tx.id,
                    status = %status,
                    "unexpected gateway status, failing payment"
                );
                (TxStatus::Failed, None)
            }
            Err(err) => {
                tracing::warn!(
                    transaction_id = %tx.id,
                    error = %err,
                    "gateway call failed, refunding"
                );
                (TxStatus::Failed, Some(err.clone()))
            }
        };

        let (refund, terminal_events) = match final_status {
            TxStatus::Approved => (
                None,
                vec![OutboxEvent::new(
                    events::PAYMENT_COMPLETED,
                    json!({
                        "transaction_id": tx.id,
                        "status": final_status.as_str(),
                    }),
                )],
            ),
            _ => {
                let refund = Transaction::refund_of(&tx)?;
                let events = vec![
                    OutboxEvent::new(
                        events::REFUND_CREATED,
                        json!({
                            "transaction_id": refund.id,
                            "original_transaction_id": tx.id,
                            "status": refund.status.as_str(),
                        }),
                    ),
                    OutboxEvent::new(
                        events::PAYMENT_FAILED,
                        json!({
                            "transaction_id": tx.id,
                            "status": final_status.as_str(),
                        }),
                    ),
                ];
                (Some(refund), events)
            }
        };

        self.store
            .finalize_payment(tx.id, final_status, refund.as_ref(), &terminal_events)
            .await?;

        // Retry-exhausted gateway failures surface to the caller; the refund
        // has already been applied above.
        if let Some(err) = gateway_err {
            return Err(err);
        }

        let mut resp = ProcessPaymentResponse {
            transaction_id: tx.id,
            status: final_status.as_str().to_string(),
        };

        if let Some(key) = idempotency_key {
            let record = IdempotencyRecord {
                user_id: req.user_id,
                key: key.to_string(),
                request_id: tx.id,
                response: serde_json::to_value(&resp)
                    .map_err(|_| AppError::internal("failed to encode idempotency response"))?,
                created_at: Utc::now(),
            };
            // Two concurrent requests with the same key can both reach here;
            // whichever insert wins is the canonical response.
            let winner = self.idempotency.put(&record).await?;
            resp = serde_json::from_value(winner.response)
                .map_err(|_| AppError::internal("failed to decode stored idempotency response"))?;
        }

        Ok(resp)
    }
}
