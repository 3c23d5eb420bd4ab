use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Error codes surfaced by the API. These are stable and map 1:1 to HTTP
/// statuses in `IntoResponse`.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    pub const GATEWAY_TIMEOUT: &str = "GATEWAY_TIMEOUT";
    pub const GATEWAY_ERROR: &str = "GATEWAY_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds: {message}")]
    InsufficientFunds {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("gateway error: {0}")]
    GatewayError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        AppError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn insufficient_funds(
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        AppError::InsufficientFunds {
            message: message.into(),
            details,
        }
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        AppError::GatewayTimeout(message.into())
    }

    pub fn gateway_error(message: impl Into<String>) -> Self {
        AppError::GatewayError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    /// Stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => codes::VALIDATION_ERROR,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::InsufficientFunds { .. } => codes::INSUFFICIENT_FUNDS,
            AppError::GatewayTimeout(_) => codes::GATEWAY_TIMEOUT,
            AppError::GatewayError(_) => codes::GATEWAY_ERROR,
            AppError::Internal(_) => codes::INTERNAL,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::GatewayError(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::Unauthorized(m) => m.clone(),
            AppError::NotFound(m) => m.clone(),
            AppError::InsufficientFunds { message, .. } => message.clone(),
            AppError::GatewayTimeout(m) => m.clone(),
            AppError::GatewayError(m) => m.clone(),
            AppError::Internal(m) => m.clone(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { details, .. } => details.clone(),
            AppError::InsufficientFunds { details, .. } => details.clone(),
            _ => None,
        }
    }

    /// Whether the gateway client may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::GatewayTimeout(_) | AppError::GatewayError(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // The underlying cause is logged here and never leaked to clients.
        tracing::error!(error = %err, "database error");
        AppError::Internal("database error".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut error = json!({
            "code": self.code(),
            "message": self.message(),
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Shape of error payloads, mirrored by clients and tests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::validation("invalid input", None);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), codes::VALIDATION_ERROR);
    }

    #[test]
    fn test_insufficient_funds_is_conflict() {
        let error = AppError::insufficient_funds("insufficient funds", None);
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.code(), codes::INSUFFICIENT_FUNDS);
    }

    #[test]
    fn test_gateway_errors_map_to_upstream_statuses() {
        assert_eq!(
            AppError::gateway_timeout("gateway timeout").status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::gateway_error("gateway error").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::gateway_timeout("t").is_retryable());
        assert!(AppError::gateway_error("e").is_retryable());
        assert!(!AppError::internal("i").is_retryable());
        assert!(!AppError::validation("v", None).is_retryable());
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let error = AppError::validation("invalid payment request", Some(json!({ "amount": -5 })));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["amount"], -5);
    }
}
