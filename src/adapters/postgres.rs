//! Postgres implementation of the store ports.
//!
//! One struct backs all four stores, mirroring the single persistence layer
//! the services are wired against. Multi-row operations run inside explicit
//! database transactions; the balance row is serialized per
//! `(user_id, currency)` with `SELECT ... FOR UPDATE`.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction as DbTx};
use uuid::Uuid;

use crate::db::models::{IdempotencyRecord, OutboxEvent};
use crate::domain::{Transaction, TxStatus, TxType, Wallet};
use crate::error::AppError;
use crate::ports::{IdempotencyStore, OutboxStore, PaymentStore, WalletStore};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the balance row for the pair, creating nothing. `None` means no
    /// balance row exists yet for the currency.
    async fn lock_balance(
        dbtx: &mut DbTx<'_, Postgres>,
        user_id: Uuid,
        currency: &str,
    ) -> Result<Option<BalanceRow>, AppError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT id, wallet_id, user_id, currency, amount, updated_at
             FROM wallet_balances
             WHERE user_id = $1 AND currency = $2
             FOR UPDATE",
        )
        .bind(user_id)
        .bind(currency)
        .fetch_optional(&mut **dbtx)
        .await?;
        Ok(row)
    }

    async fn wallet_id_for(
        dbtx: &mut DbTx<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<Option<Uuid>, AppError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut **dbtx)
            .await?;
        Ok(id)
    }

    async fn insert_transaction(
        dbtx: &mut DbTx<'_, Postgres>,
        tx: &Transaction,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, type, amount, currency, status,
                provider_id, external_reference, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.tx_type.as_str())
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(tx.status.as_str())
        .bind(tx.provider_id)
        .bind(&tx.external_reference)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&mut **dbtx)
        .await?;
        Ok(())
    }

    async fn insert_outbox_event(
        dbtx: &mut DbTx<'_, Postgres>,
        event: &OutboxEvent,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO outbox (id, event_type, payload, created_at, sent_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.created_at)
        .bind(event.sent_at)
        .execute(&mut **dbtx)
        .await?;
        Ok(())
    }

    /// Credits a balance inside an open transaction, creating the row lazily
    /// for a currency touched for the first time.
    async fn credit_balance(
        dbtx: &mut DbTx<'_, Postgres>,
        wallet_id: Uuid,
        user_id: Uuid,
        currency: &str,
        amount: i64,
    ) -> Result<i64, AppError> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO wallet_balances (id, wallet_id, user_id, currency, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, currency)
            DO UPDATE SET amount = wallet_balances.amount + EXCLUDED.amount,
                          updated_at = now()
            RETURNING amount
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wallet_id)
        .bind(user_id)
        .bind(currency)
        .bind(amount)
        .fetch_one(&mut **dbtx)
        .await?;
        Ok(balance)
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn begin_payment(&self, tx: &Transaction, event: &OutboxEvent) -> Result<(), AppError> {
        let mut dbtx = self.pool.begin().await?;

        if Self::wallet_id_for(&mut dbtx, tx.user_id).await?.is_none() {
            return Err(AppError::not_found("wallet not found"));
        }

        let balance = Self::lock_balance(&mut dbtx, tx.user_id, &tx.currency).await?;
        let current = balance.as_ref().map(|b| b.amount).unwrap_or(0);
        if current < tx.amount {
            return Err(AppError::insufficient_funds(
                "insufficient funds",
                Some(json!({
                    "currency": tx.currency,
                    "current": current,
                    "required": tx.amount,
                })),
            ));
        }

        // The row exists whenever current >= amount > 0.
        sqlx::query(
            "UPDATE wallet_balances SET amount = amount - $3, updated_at = now()
             WHERE user_id = $1 AND currency = $2",
        )
        .bind(tx.user_id)
        .bind(&tx.currency)
        .bind(tx.amount)
        .execute(&mut *dbtx)
        .await?;

        Self::insert_transaction(&mut dbtx, tx).await?;
        Self::insert_outbox_event(&mut dbtx, event).await?;

        dbtx.commit().await?;
        Ok(())
    }

    async fn finalize_payment(
        &self,
        payment_id: Uuid,
        status: TxStatus,
        refund: Option<&Transaction>,
        events: &[OutboxEvent],
    ) -> Result<(), AppError> {
        let mut dbtx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(payment_id)
        .fetch_optional(&mut *dbtx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("transaction {payment_id} not found")))?;

        let mut current = row.into_domain()?;
        current.update_status(status)?;

        sqlx::query("UPDATE transactions SET status = $2, updated_at = now() WHERE id = $1")
            .bind(payment_id)
            .bind(status.as_str())
            .execute(&mut *dbtx)
            .await?;

        if let Some(refund) = refund {
            let wallet_id = Self::wallet_id_for(&mut dbtx, refund.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("wallet not found"))?;
            Self::insert_transaction(&mut dbtx, refund).await?;
            Self::credit_balance(
                &mut dbtx,
                wallet_id,
                refund.user_id,
                &refund.currency,
                refund.amount,
            )
            .await?;
        }

        for event in events {
            Self::insert_outbox_event(&mut dbtx, event).await?;
        }

        dbtx.commit().await?;
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("transaction {id} not found")))?;
        row.into_domain()
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64), AppError> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let txs = rows
            .into_iter()
            .map(TransactionRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((txs, total))
    }
}

#[async_trait]
impl WalletStore for PostgresStore {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Wallet, AppError> {
        let wallet = sqlx::query_as::<_, WalletRow>(
            "SELECT id, user_id, name, created_at FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("wallet not found"))?;

        let balances = sqlx::query_as::<_, BalanceRow>(
            "SELECT id, wallet_id, user_id, currency, amount, updated_at
             FROM wallet_balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(wallet.into_domain(balances))
    }

    async fn create_wallet(&self, wallet: &Wallet) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO wallets (id, user_id, name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(&wallet.name)
        .bind(wallet.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AppError::validation(
                "wallet already exists",
                Some(json!({ "user_id": wallet.user_id })),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<(Vec<Wallet>, i64), AppError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await?;

        let wallets = sqlx::query_as::<_, WalletRow>(
            "SELECT id, user_id, name, created_at FROM wallets
             ORDER BY created_at
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        if wallets.is_empty() {
            return Ok((Vec::new(), total));
        }

        let user_ids: Vec<Uuid> = wallets.iter().map(|w| w.user_id).collect();
        let balances = sqlx::query_as::<_, BalanceRow>(
            "SELECT id, wallet_id, user_id, currency, amount, updated_at
             FROM wallet_balances WHERE user_id = ANY($1)",
        )
        .bind(&user_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<Uuid, Vec<BalanceRow>> = HashMap::new();
        for balance in balances {
            by_user.entry(balance.user_id).or_default().push(balance);
        }

        let out = wallets
            .into_iter()
            .map(|w| {
                let balances = by_user.remove(&w.user_id).unwrap_or_default();
                w.into_domain(balances)
            })
            .collect();
        Ok((out, total))
    }

    async fn top_up(&self, tx: &Transaction) -> Result<i64, AppError> {
        let mut dbtx = self.pool.begin().await?;

        let wallet_id = Self::wallet_id_for(&mut dbtx, tx.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("wallet not found"))?;

        let balance =
            Self::credit_balance(&mut dbtx, wallet_id, tx.user_id, &tx.currency, tx.amount).await?;
        Self::insert_transaction(&mut dbtx, tx).await?;

        dbtx.commit().await?;
        Ok(balance)
    }
}

#[async_trait]
impl IdempotencyStore for PostgresStore {
    async fn get(&self, user_id: Uuid, key: &str) -> Result<Option<IdempotencyRecord>, AppError> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT user_id, key, request_id, response, created_at
             FROM idempotency_records
             WHERE user_id = $1 AND key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn put(&self, record: &IdempotencyRecord) -> Result<IdempotencyRecord, AppError> {
        // On a duplicate-key race the first writer wins; re-read and return
        // the winning record.
        let inserted = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            INSERT INTO idempotency_records (id, user_id, key, request_id, response, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, key) DO NOTHING
            RETURNING user_id, key, request_id, response, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(&record.key)
        .bind(record.request_id)
        .bind(&record.response)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(winner) => Ok(winner),
            None => self
                .get(record.user_id, &record.key)
                .await?
                .ok_or_else(|| AppError::internal("idempotency record vanished after conflict")),
        }
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, AppError> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            "SELECT id, event_type, payload, created_at, sent_at
             FROM outbox
             WHERE sent_at IS NULL
             ORDER BY created_at
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn mark_sent(&self, event_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE outbox SET sent_at = now() WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

// Internal row types for sqlx. Not exposed outside the adapter.

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl WalletRow {
    fn into_domain(self, balances: Vec<BalanceRow>) -> Wallet {
        Wallet {
            id: self.id,
            user_id: self.user_id,
            balances: balances
                .into_iter()
                .map(|b| (b.currency, b.amount))
                .collect(),
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    #[allow(dead_code)]
    id: Uuid,
    #[allow(dead_code)]
    wallet_id: Uuid,
    user_id: Uuid,
    currency: String,
    amount: i64,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    tx_type: String,
    amount: i64,
    currency: String,
    status: String,
    provider_id: Uuid,
    external_reference: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<Transaction, AppError> {
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            tx_type: TxType::from_str(&self.tx_type)?,
            amount: self.amount,
            currency: self.currency,
            status: TxStatus::from_str(&self.status)?,
            provider_id: self.provider_id,
            external_reference: self.external_reference,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
