//! Transaction domain entity.
//! Immutable ledger entry; only `status` and `updated_at` may change, and
//! status transitions follow PENDING -> {APPROVED, DECLINED, FAILED}.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Payment,
    Refund,
    #[serde(rename = "TOPUP")]
    TopUp,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Payment => "PAYMENT",
            TxType::Refund => "REFUND",
            TxType::TopUp => "TOPUP",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(TxType::Payment),
            "REFUND" => Ok(TxType::Refund),
            "TOPUP" => Ok(TxType::TopUp),
            other => Err(AppError::internal(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Approved,
    Declined,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Approved => "APPROVED",
            TxStatus::Declined => "DECLINED",
            TxStatus::Failed => "FAILED",
        }
    }

    /// Terminal statuses are sinks.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        match self {
            TxStatus::Pending => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TxStatus::Pending),
            "APPROVED" => Ok(TxStatus::Approved),
            "DECLINED" => Ok(TxStatus::Declined),
            "FAILED" => Ok(TxStatus::Failed),
            other => Err(AppError::internal(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Amount in minor units, always positive.
    pub amount: i64,
    pub currency: String,
    pub status: TxStatus,
    pub provider_id: Uuid,
    pub external_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        tx_type: TxType,
        amount: i64,
        currency: String,
        provider_id: Uuid,
        external_reference: String,
    ) -> Result<Self, AppError> {
        if user_id.is_nil() {
            return Err(AppError::validation("user_id cannot be nil", None));
        }
        if amount <= 0 {
            return Err(AppError::validation(
                "amount must be positive",
                Some(json!({ "amount": amount })),
            ));
        }
        if currency.is_empty() {
            return Err(AppError::validation("currency cannot be empty", None));
        }
        let now = Utc::now();
        Ok(Transaction {
            id: Uuid::new_v4(),
            user_id,
            tx_type,
            amount,
            currency,
            status: TxStatus::Pending,
            provider_id,
            external_reference,
            created_at: now,
            updated_at: now,
        })
    }

    /// Builds the compensating REFUND for a payment. Refunds are distinct
    /// transactions created directly in APPROVED.
    pub fn refund_of(original: &Transaction) -> Result<Self, AppError> {
        let mut refund = Transaction::new(
            original.user_id,
            TxType::Refund,
            original.amount,
            original.currency.clone(),
            original.provider_id,
            original.external_reference.clone(),
        )?;
        refund.status = TxStatus::Approved;
        Ok(refund)
    }

    /// Applies a status transition, rejecting moves out of terminal states.
    pub fn update_status(&mut self, next: TxStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::validation(
                "invalid status transition",
                Some(json!({
                    "current": self.status.as_str(),
                    "new": next.as_str(),
                })),
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
