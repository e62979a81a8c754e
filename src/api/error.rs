//! API error type with structured JSON responses.
//!
//! Every domain error converts into [`ApiError`]; the response body is
//! always `{"error": {"code", "message", "fields"?}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::cart::CartError;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::news::NewsError;
use crate::scoreboard::ScoreboardError;
use crate::search::SearchError;
use crate::shop::ShopError;
use crate::validation::FieldErrors;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Login failed: {0}")]
    LoginFailed(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("Upstream error: {0}")]
    BadGateway(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::LoginFailed(detail) => (StatusCode::UNAUTHORIZED, "LOGIN_FAILED", detail, None),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail, None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                "Invalid input".to_string(),
                Some(errors),
            ),
            ApiError::BadGateway(detail) => {
                tracing::warn!(detail, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "UPSTREAM", detail, None)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message, fields },
        };
        (status, Json(body)).into_response()
    }
}

// ── Infrastructure errors ───────────────────────────────────

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => e.into(),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => ApiError::NotFound(format!("{entity_type} not found")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Domain errors ───────────────────────────────────────────

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials | AccountError::Disabled => ApiError::LoginFailed(err.to_string()),
            AccountError::Validation(fields) => ApiError::Validation(fields),
            AccountError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            ShopError::Forbidden(detail) => ApiError::Forbidden(detail),
            ShopError::Validation(fields) => ApiError::Validation(fields),
            ShopError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductNotFound | CartError::ItemNotFound => ApiError::NotFound(err.to_string()),
            CartError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<NewsError> for ApiError {
    fn from(err: NewsError) -> Self {
        match err {
            NewsError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            NewsError::Forbidden(detail) => ApiError::Forbidden(detail),
            NewsError::Validation(fields) => ApiError::Validation(fields),
            NewsError::InvalidReaction(_) | NewsError::Import(_) => ApiError::BadRequest(err.to_string()),
            NewsError::Database(e) => e.into(),
        }
    }
}

impl From<ScoreboardError> for ApiError {
    fn from(err: ScoreboardError) -> Self {
        match err {
            ScoreboardError::NotFound => ApiError::NotFound(err.to_string()),
            ScoreboardError::Forbidden(detail) => ApiError::Forbidden(detail),
            ScoreboardError::Validation(fields) => ApiError::Validation(fields),
            ScoreboardError::Import(_) => ApiError::BadRequest(err.to_string()),
            ScoreboardError::Database(e) => e.into(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            SearchError::Forbidden(detail) => ApiError::Forbidden(detail),
            SearchError::Validation(fields) => ApiError::Validation(fields),
            SearchError::Database(e) => e.into(),
        }
    }
}
