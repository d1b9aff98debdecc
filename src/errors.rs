use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::header::HeaderError;
use crate::auth::jwt::TokenError;
use crate::auth::refresh::RefreshError;
use crate::store::StoreError;

/// Internal reason for an authentication failure. Logged, never rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("access token rejected: {0}")]
    AccessToken(TokenError),

    #[error("refresh token not found")]
    RefreshNotFound,

    #[error("refresh token expired")]
    RefreshExpired,

    #[error("refresh token revoked")]
    RefreshRevoked,

    #[error("api key mismatch")]
    ApiKeyMismatch,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(#[from] HeaderError),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("unauthorized: {0}")]
    Unauthorized(AuthFailure),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the same request may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(AuthFailure::AccessToken(e))
    }
}

impl From<RefreshError> for AppError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::NotFound => AppError::Unauthorized(AuthFailure::RefreshNotFound),
            RefreshError::Expired => AppError::Unauthorized(AuthFailure::RefreshExpired),
            RefreshError::Revoked => AppError::Unauthorized(AuthFailure::RefreshRevoked),
            RefreshError::Store(e) => AppError::Unavailable(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, code, msg) = match &self {
            AppError::BadRequest(e) => (
                "invalid_request_error",
                "invalid_authorization_header",
                e.to_string(),
            ),
            AppError::InvalidInput(reason) => (
                "invalid_request_error",
                "invalid_input",
                reason.to_string(),
            ),
            // SECURITY: the failure reason stays in the logs; every auth
            // failure looks the same to the caller.
            AppError::Unauthorized(_) => (
                "authentication_error",
                "unauthorized",
                "unauthorized".to_string(),
            ),
            AppError::Forbidden(reason) => (
                "permission_error",
                "forbidden",
                reason.to_string(),
            ),
            AppError::Conflict(_) => (
                "invalid_request_error",
                "conflict",
                "resource already exists".to_string(),
            ),
            AppError::Unavailable(e) => {
                tracing::error!("Store error: {}", e);
                (
                    "unavailable_error",
                    "store_unavailable",
                    "service temporarily unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Add Retry-After header for retryable store failures
        if self.is_retryable() {
            response.headers_mut().insert(
                "retry-after",
                axum::http::HeaderValue::from_static("1"),
            );
        }

        response
    }
}
