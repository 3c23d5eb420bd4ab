//! Payment request descriptor sent to the external gateway.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub external_reference: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
}

impl Payment {
    pub fn new(
        user_id: Uuid,
        provider_id: Uuid,
        external_reference: String,
        amount: i64,
        currency: String,
    ) -> Result<Self, AppError> {
        if user_id.is_nil() {
            return Err(AppError::validation("user_id cannot be nil", None));
        }
        if provider_id.is_nil() {
            return Err(AppError::validation("provider_id cannot be nil", None));
        }
        if external_reference.is_empty() {
            return Err(AppError::validation(
                "external_reference cannot be empty",
                None,
            ));
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
        Ok(Payment {
            id: Uuid::new_v4(),
            user_id,
            provider_id,
            external_reference,
            amount,
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_validation() {
        let user = Uuid::new_v4();
        let provider = Uuid::new_v4();

        assert!(Payment::new(user, provider, "ref".into(), 100, "USD".into()).is_ok());
        assert!(Payment::new(Uuid::nil(), provider, "ref".into(), 100, "USD".into()).is_err());
        assert!(Payment::new(user, Uuid::nil(), "ref".into(), 100, "USD".into()).is_err());
        assert!(Payment::new(user, provider, "".into(), 100, "USD".into()).is_err());
        assert!(Payment::new(user, provider, "ref".into(), -1, "USD".into()).is_err());
        assert!(Payment::new(user, provider, "ref".into(), 100, "".into()).is_err());
    }
}
