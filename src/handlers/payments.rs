use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::ProcessPaymentRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub external_reference: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

/// POST /wallets/:user_id/payments
pub async fn create_payment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PaymentBody>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let mut details = Map::new();
    let provider_id = match Uuid::parse_str(&body.provider_id) {
        Ok(id) => id,
        Err(_) => {
            details.insert("provider_id".to_string(), json!(body.provider_id));
            Uuid::nil()
        }
    };
    if body.external_reference.is_empty() {
        details.insert("external_reference".to_string(), json!("required"));
    }
    if body.amount <= 0 {
        details.insert("amount".to_string(), json!(body.amount));
    }
    if body.currency.is_empty() {
        details.insert("currency".to_string(), json!("required"));
    }
    if !details.is_empty() {
        return Err(AppError::validation(
            "invalid payment request",
            Some(details.into()),
        ));
    }

    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let req = ProcessPaymentRequest {
        user_id,
        provider_id,
        external_reference: body.external_reference,
        amount: body.amount,
        currency: body.currency,
        idempotency_key,
    };

    let resp = state.payments.process_payment(&req).await?;
    Ok(Json(resp))
}

pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::validation("invalid user_id", Some(json!({ "user_id": raw }))))
}
