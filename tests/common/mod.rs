#![allow(dead_code)]

//! In-memory test doubles for the store and gateway ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use vaultpay::db::models::{IdempotencyRecord, OutboxEvent};
use vaultpay::domain::{Payment, Transaction, TxStatus, Wallet};
use vaultpay::error::AppError;
use vaultpay::ports::{
    IdempotencyStore, OutboxStore, PaymentGateway, PaymentStore, WalletStore,
};

/// Single in-memory persistence layer backing all store ports, mirroring the
/// real adapter where one Postgres store implements them all.
#[derive(Default)]
pub struct InMemoryStore {
    pub wallets: Mutex<HashMap<Uuid, Wallet>>,
    pub transactions: Mutex<Vec<Transaction>>,
    pub idempotency: Mutex<HashMap<(Uuid, String), IdempotencyRecord>>,
    pub outbox: Mutex<Vec<OutboxEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_wallet(&self, user_id: Uuid, currency: &str, amount: i64) {
        let mut wallet = Wallet::new(user_id).unwrap();
        if amount > 0 {
            wallet.credit(currency, amount).unwrap();
        }
        self.wallets.lock().unwrap().insert(user_id, wallet);
    }

    pub fn seed_event(&self, event: OutboxEvent) {
        self.outbox.lock().unwrap().push(event);
    }

    pub fn balance_of(&self, user_id: Uuid, currency: &str) -> i64 {
        self.wallets
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|w| w.balance(currency))
            .unwrap_or(0)
    }

    pub fn transactions_of(&self, user_id: Uuid) -> Vec<Transaction> {
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Event types in insertion order.
    pub fn event_types(&self) -> Vec<String> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<OutboxEvent> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn begin_payment(&self, tx: &Transaction, event: &OutboxEvent) -> Result<(), AppError> {
        let mut wallets = self.wallets.lock().unwrap();
        let wallet = wallets
            .get_mut(&tx.user_id)
            .ok_or_else(|| AppError::not_found("wallet not found"))?;
        wallet.debit(&tx.currency, tx.amount)?;

        self.transactions.lock().unwrap().push(tx.clone());
        self.outbox.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn finalize_payment(
        &self,
        payment_id: Uuid,
        status: TxStatus,
        refund: Option<&Transaction>,
        events: &[OutboxEvent],
    ) -> Result<(), AppError> {
        {
            let mut transactions = self.transactions.lock().unwrap();
            let tx = transactions
                .iter_mut()
                .find(|t| t.id == payment_id)
                .ok_or_else(|| AppError::not_found("transaction not found"))?;
            tx.update_status(status)?;
        }

        if let Some(refund) = refund {
            let mut wallets = self.wallets.lock().unwrap();
            let wallet = wallets
                .get_mut(&refund.user_id)
                .ok_or_else(|| AppError::not_found("wallet not found"))?;
            wallet.credit(&refund.currency, refund.amount)?;
            self.transactions.lock().unwrap().push(refund.clone());
        }

        let mut outbox = self.outbox.lock().unwrap();
        for event in events {
            outbox.push(event.clone());
        }
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        self.transactions
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("transaction not found"))
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Transaction>, i64), AppError> {
        let all = self.transactions_of(user_id);
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn get_wallet(&self, user_id: Uuid) -> Result<Wallet, AppError> {
        self.wallets
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("wallet not found"))
    }

    async fn create_wallet(&self, wallet: &Wallet) -> Result<(), AppError> {
        let mut wallets = self.wallets.lock().unwrap();
        if wallets.contains_key(&wallet.user_id) {
            return Err(AppError::validation("wallet already exists", None));
        }
        wallets.insert(wallet.user_id, wallet.clone());
        Ok(())
    }

    async fn list_wallets(&self, limit: i64, offset: i64) -> Result<(Vec<Wallet>, i64), AppError> {
        let wallets = self.wallets.lock().unwrap();
        let mut all: Vec<Wallet> = wallets.values().cloned().collect();
        all.sort_by_key(|w| w.created_at);
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn top_up(&self, tx: &Transaction) -> Result<i64, AppError> {
        let mut wallets = self.wallets.lock().unwrap();
        let wallet = wallets
            .get_mut(&tx.user_id)
            .ok_or_else(|| AppError::not_found("wallet not found"))?;
        wallet.credit(&tx.currency, tx.amount)?;
        let balance = wallet.balance(&tx.currency);
        self.transactions.lock().unwrap().push(tx.clone());
        Ok(balance)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStore {
    async fn get(&self, user_id: Uuid, key: &str) -> Result<Option<IdempotencyRecord>, AppError> {
        Ok(self
            .idempotency
            .lock()
            .unwrap()
            .get(&(user_id, key.to_string()))
            .cloned())
    }

    async fn put(&self, record: &IdempotencyRecord) -> Result<IdempotencyRecord, AppError> {
        let mut records = self.idempotency.lock().unwrap();
        let key = (record.user_id, record.key.clone());
        // first writer wins
        Ok(records.entry(key).or_insert_with(|| record.clone()).clone())
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn pending_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, AppError> {
        let mut pending: Vec<OutboxEvent> = self
            .outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.sent_at.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_sent(&self, event_id: Uuid) -> Result<(), AppError> {
        let mut outbox = self.outbox.lock().unwrap();
        if let Some(event) = outbox.iter_mut().find(|e| e.id == event_id) {
            event.sent_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Gateway double returning a fixed outcome and counting calls.
pub struct ScriptedGateway {
    outcome: Mutex<Result<String, AppError>>,
    pub calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn approving() -> Self {
        Self::with_status("approved")
    }

    pub fn declining() -> Self {
        Self::with_status("declined")
    }

    pub fn with_status(status: &str) -> Self {
        ScriptedGateway {
            outcome: Mutex::new(Ok(status.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: AppError) -> Self {
        ScriptedGateway {
            outcome: Mutex::new(Err(err)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn process_payment(&self, _payment: &Payment) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().clone()
    }
}
