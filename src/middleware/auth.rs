use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Static API key check on X-API-Key. Disabled when no key is configured;
/// the health endpoint is always open.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.api_key.is_empty() || req.uri().path() == "/healthz" {
        return Ok(next.run(req).await);
    }

    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.api_key => Ok(next.run(req).await),
        _ => Err(AppError::unauthorized("invalid api key")),
    }
}
