//! Wallet domain entity.
//! Holds per-currency balances in integer minor units.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_WALLET_NAME_LEN: usize = 20;

/// A user's wallet. Exactly one wallet exists per user; balances are created
/// lazily per currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    /// currency -> balance in minor units
    pub balances: HashMap<String, i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid) -> Result<Self, AppError> {
        Self::with_name(user_id, String::new())
    }

    pub fn with_name(user_id: Uuid, name: String) -> Result<Self, AppError> {
        if user_id.is_nil() {
            return Err(AppError::validation("user_id cannot be nil", None));
        }
        if name.len() > MAX_WALLET_NAME_LEN {
            return Err(AppError::validation(
                "name must be at most 20 characters",
                Some(json!({ "name": name })),
            ));
        }
        Ok(Wallet {
            id: Uuid::new_v4(),
            user_id,
            balances: HashMap::new(),
            name,
            created_at: Utc::now(),
        })
    }

    /// Balance for a currency; zero when the currency was never touched.
    pub fn balance(&self, currency: &str) -> i64 {
        self.balances.get(currency).copied().unwrap_or(0)
    }

    /// Debits an amount, validating sufficient funds.
    pub fn debit(&mut self, currency: &str, amount: i64) -> Result<(), AppError> {
        if amount <= 0 {
            return Err(AppError::validation(
                "debit amount must be positive",
                Some(json!({ "amount": amount })),
            ));
        }
        let current = self.balance(currency);
        if current < amount {
            return Err(AppError::insufficient_funds(
                "insufficient funds",
                Some(json!({
                    "currency": currency,
                    "current": current,
                    "required": amount,
                })),
            ));
        }
        self.balances.insert(currency.to_string(), current - amount);
        Ok(())
    }

    /// Credits an amount to a currency.
    pub fn credit(&mut self, currency: &str, amount: i64) -> Result<(), AppError> {
        if amount <= 0 {
            return Err(AppError::validation(
                "credit amount must be positive",
                Some(json!({ "amount": amount })),
            ));
        }
        let current = self.balance(currency);
        self.balances.insert(currency.to_string(), current + amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_rejects_nil_user() {
        assert!(Wallet::new(Uuid::nil()).is_err());
    }

    #[test]
    fn test_name_length_limit() {
        let user = Uuid::new_v4();
        assert!(Wallet::with_name(user, "a".repeat(21)).is_err());
        assert!(Wallet::with_name(user, "a".repeat(20)).is_ok());
    }

    #[test]
    fn test_debit_and_credit() {
        let mut wallet = Wallet::new(Uuid::new_v4()).unwrap();
        wallet.credit("USD", 1000).unwrap();
        assert_eq!(wallet.balance("USD"), 1000);

        wallet.debit("USD", 400).unwrap();
        assert_eq!(wallet.balance("USD"), 600);
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let mut wallet = Wallet::new(Uuid::new_v4()).unwrap();
        wallet.credit("USD", 100).unwrap();

        let err = wallet.debit("USD", 500).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::INSUFFICIENT_FUNDS);
        // balance untouched on failure
        assert_eq!(wallet.balance("USD"), 100);
    }

    #[test]
    fn test_debit_exact_balance_leaves_zero() {
        let mut wallet = Wallet::new(Uuid::new_v4()).unwrap();
        wallet.credit("USD", 500).unwrap();
        wallet.debit("USD", 500).unwrap();
        assert_eq!(wallet.balance("USD"), 0);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut wallet = Wallet::new(Uuid::new_v4()).unwrap();
        assert!(wallet.credit("USD", 0).is_err());
        assert!(wallet.credit("USD", -5).is_err());
        assert!(wallet.debit("USD", 0).is_err());
    }
}
