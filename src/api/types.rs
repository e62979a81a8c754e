//! Shared types for the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::User;

/// Header carrying the session token, both ways.
pub const SESSION_HEADER: &str = "X-Session-Token";

/// Timeout for outbound image fetches.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus the outbound HTTP client.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub http: reqwest::Client,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { core, http }
    }
}

/// The signed-in user, or 401.
pub fn require_user(viewer: &Viewer) -> Result<&User, ApiError> {
    viewer.user.as_ref().ok_or(ApiError::Unauthorized)
}

/// Token from `Authorization: Bearer …`, falling back to `X-Session-Token`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let header = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    bearer
        .or(header)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ═══════════════════════════════════════════════════════════
// Payload: JSON or URL-encoded request bodies
// ═══════════════════════════════════════════════════════════

/// Request body accepted as `application/json` or as a URL-encoded form.
/// A body without a content type is read as JSON; an empty one as `{}`.
#[derive(Debug, Clone, Default)]
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Payload(value));
        }
        if content_type.starts_with("application/json") {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Payload(value));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &body };
        serde_json::from_slice(raw)
            .map(Payload)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
    }
}
