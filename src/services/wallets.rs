//! Wallet use cases: creation, listing, balances, history, top-ups.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{Transaction, TxType, Wallet};
use crate::error::AppError;
use crate::ports::{PaymentStore, WalletStore};

#[derive(Debug, Serialize, Deserialize)]
pub struct GetBalanceResponse {
    pub user_id: Uuid,
    pub balances: HashMap<String, i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct TopUpRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopUpResponse {
    pub transaction_id: Uuid,
    pub balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletSummary {
    pub user_id: Uuid,
    pub balances: HashMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListWalletsResponse {
    pub wallets: Vec<WalletSummary>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWalletResponse {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Clone)]
pub struct WalletService {
    wallets: Arc<dyn WalletStore>,
    payments: Arc<dyn PaymentStore>,
}

impl WalletService {
    pub fn new(wallets: Arc<dyn WalletStore>, payments: Arc<dyn PaymentStore>) -> Self {
        WalletService { wallets, payments }
    }

    /// Creates a wallet; a second create for the same user is a validation
    /// error, not an upsert.
    pub async fn create_wallet(
        &self,
        req: &CreateWalletRequest,
    ) -> Result<CreateWalletResponse, AppError> {
        let wallet = Wallet::with_name(req.user_id, req.name.clone())?;
        self.wallets.create_wallet(&wallet).await?;
        Ok(CreateWalletResponse {
            user_id: wallet.user_id,
            name: wallet.name,
        })
    }

    /// Balance view. An absent wallet reads as empty balances rather than an
    /// error.
    pub async fn get_balance(&self, user_id: Uuid) -> Result<GetBalanceResponse, AppError> {
        match self.wallets.get_wallet(user_id).await {
            Ok(wallet) => Ok(GetBalanceResponse {
                user_id: wallet.user_id,
                balances: wallet.balances,
                name: wallet.name,
            }),
            Err(AppError::NotFound(_)) => Ok(GetBalanceResponse {
                user_id,
                balances: HashMap::new(),
                name: String::new(),
            }),
            Err(err) => Err(err),
        }
    }

    pub async fn get_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<GetTransactionsResponse, AppError> {
        let (transactions, total) = self
            .payments
            .list_transactions(user_id, limit, offset)
            .await?;
        Ok(GetTransactionsResponse {
            transactions,
            total,
        })
    }

    /// Credits the wallet and records an APPROVED TOPUP transaction.
    pub async fn top_up(&self, req: &TopUpRequest) -> Result<TopUpResponse, AppError> {
        if req.amount <= 0 {
            return Err(AppError::validation(
                "amount must be positive",
                Some(json!({ "amount": req.amount })),
            ));
        }
        if req.currency.is_empty() {
            return Err(AppError::validation("currency cannot be empty", None));
        }

        let mut tx = Transaction::new(
            req.user_id,
            TxType::TopUp,
            req.amount,
            req.currency.clone(),
            Uuid::nil(),
            "top-up".to_string(),
        )?;
        tx.update_status(crate::domain::TxStatus::Approved)?;

        let balance = self.wallets.top_up(&tx).await?;
        Ok(TopUpResponse {
            transaction_id: tx.id,
            balance,
        })
    }

    pub async fn list_wallets(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<ListWalletsResponse, AppError> {
        let (wallets, total) = self.wallets.list_wallets(limit, offset).await?;
        let wallets = wallets
            .into_iter()
            .map(|w| WalletSummary {
                user_id: w.user_id,
                balances: w.balances,
            })
            .collect();
        Ok(ListWalletsResponse { wallets, total })
    }
}
