use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map};

use crate::error::AppError;
use crate::handlers::payments::parse_user_id;
use crate::services::wallets::{CreateWalletRequest, TopUpRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Applies defaults and rejects negative values.
    fn resolve(&self) -> Result<(i64, i64), AppError> {
        let limit = self.limit.unwrap_or(20);
        let offset = self.offset.unwrap_or(0);
        if limit < 0 || offset < 0 {
            let mut details = Map::new();
            if limit < 0 {
                details.insert("limit".to_string(), json!(limit));
            }
            if offset < 0 {
                details.insert("offset".to_string(), json!(offset));
            }
            return Err(AppError::validation(
                "invalid pagination params",
                Some(details.into()),
            ));
        }
        Ok((limit, offset))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWalletBody {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
}

/// POST /wallets
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(body): Json<CreateWalletBody>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&body.user_id)?;

    let resp = state
        .wallets
        .create_wallet(&CreateWalletRequest {
            user_id,
            name: body.name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /wallets
pub async fn list_wallets(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = pagination.resolve()?;
    let resp = state.wallets.list_wallets(limit, offset).await?;
    Ok(Json(resp))
}

/// GET /wallets/:user_id/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let resp = state.wallets.get_balance(user_id).await?;
    Ok(Json(resp))
}

/// GET /wallets/:user_id/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let (limit, offset) = pagination.resolve()?;
    let resp = state.wallets.get_transactions(user_id, limit, offset).await?;
    Ok(Json(resp))
}

#[derive(Debug, Deserialize)]
pub struct TopUpBody {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

/// POST /wallets/:user_id/top-up
pub async fn top_up(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<TopUpBody>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let mut details = Map::new();
    if body.amount <= 0 {
        details.insert("amount".to_string(), json!(body.amount));
    }
    if body.currency.is_empty() {
        details.insert("currency".to_string(), json!("required"));
    }
    if !details.is_empty() {
        return Err(AppError::validation(
            "invalid top-up request",
            Some(details.into()),
        ));
    }

    let resp = state
        .wallets
        .top_up(&TopUpRequest {
            user_id,
            amount: body.amount,
            currency: body.currency,
        })
        .await?;
    Ok(Json(resp))
}
