//! Trait seams between the application core and its adapters.
//!
//! The Postgres adapter implements the store traits; tests substitute
//! in-memory fakes. Methods that must be atomic take every row they touch so
//! the adapter can wrap them in a single database transaction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{IdempotencyRecord, OutboxEvent};
use crate::domain::{Payment, Transaction, TxStatus, Wallet};
use crate::error::AppError;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Debits the payer's balance and records the PENDING transaction plus
    /// its `payment.created` outbox row, all in one database transaction.
    /// The balance row is locked for the duration; fails with NOT_FOUND when
    /// the wallet does not exist and INSUFFICIENT_FUNDS when the balance
    /// cannot cover the amount.
    async fn begin_payment(&self, tx: &Transaction, event: &OutboxEvent) -> Result<(), AppError>;

    /// Settles a payment in a second database transaction: status update,
    /// optional refund (APPROVED REFUND row plus balance credit), and the
    /// terminal outbox events. Rejects transitions out of terminal states.
    async fn finalize_payment(
        &self,
        payment_id: Uuid,
        status: TxStatus,
        refund: Option<&Transaction>,
        events: &[OutboxEvent],
    ) -> Result<(), AppError>;

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError>;

    /// Returns one page of a user's transactions plus the total count.
    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64), AppError>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Wallet, AppError>;

    async fn create_wallet(&self, wallet: &Wallet) -> Result<(), AppError>;

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<(Vec<Wallet>, i64), AppError>;

    /// Credits the balance and records the APPROVED TOPUP transaction
    /// atomically. Returns the new balance for the currency.
    async fn top_up(&self, tx: &Transaction) -> Result<i64, AppError>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn get(&self, user_id: Uuid, key: &str) -> Result<Option<IdempotencyRecord>, AppError>;

    /// Inserts the record, resolving a duplicate-key race by returning the
    /// record that won the insert.
    async fn put(&self, record: &IdempotencyRecord) -> Result<IdempotencyRecord, AppError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Pending events ordered by `created_at` ascending.
    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, AppError>;

    async fn mark_sent(&self, event_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the provider's status string ("approved", "declined", or
    /// anything else, which callers treat as failed).
    async fn process_payment(&self, payment: &Payment) -> Result<String, AppError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes and waits for the broker's confirm; an unconfirmed publish
    /// is an error.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), AppError>;
}
