//! Account endpoints.
//!
//! `POST /api/auth/register`, `/login`, `/logout`, `GET /api/auth/profile`
//! and the image proxy used by clients that cannot load remote thumbnails.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::accounts::{self, RegisterInput, Viewer};
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload, SESSION_HEADER};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub status: bool,
    pub message: &'static str,
    pub username: String,
    pub id: i64,
}

/// Run password hashing on the blocking pool. Callers must not hold the
/// connection guard while awaiting this.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))
}

/// `POST /api/auth/register`: 201 with the new username.
pub async fn register(
    State(ctx): State<ApiContext>,
    Payload(input): Payload<RegisterInput>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let registration = accounts::validate_registration(&input)?;
    {
        let conn = ctx.core.db()?;
        accounts::ensure_username_free(&conn, &registration.username)?;
    }

    let hasher = ctx.core.password_hasher();
    let password = registration.password.clone();
    let hash = run_blocking(move || hasher.hash(&password)).await?;

    let user = {
        let conn = ctx.core.db()?;
        accounts::insert_hashed_user(&conn, &registration.username, &registration.email, &hash, false)?
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: true,
            message: "User created successfully!",
            username: user.username,
            id: user.id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub status: bool,
    pub message: &'static str,
    pub username: String,
    pub id: i64,
    pub is_staff: bool,
    pub token: String,
}

/// `POST /api/auth/login`: rotates the session and returns its token,
/// in the body and in `X-Session-Token`.
pub async fn login(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<LoginInput>,
) -> Result<Response, ApiError> {
    let (user, hash) = {
        let conn = ctx.core.db()?;
        accounts::load_credentials(&conn, &input.username, &input.password)?
    };

    let hasher = ctx.core.password_hasher();
    let password = Zeroizing::new(input.password);
    let user = run_blocking(move || accounts::verify_credentials(&hasher, user, &hash, &password)).await??;

    let issued = {
        let conn = ctx.core.db()?;
        accounts::login(&conn, viewer.session.as_ref(), &user, ctx.core.session_ttl())?
    };

    let header = HeaderValue::from_str(&issued.token).map_err(|e| ApiError::Internal(e.to_string()))?;
    let body = LoginResponse {
        status: true,
        message: "Login successful!",
        username: user.username.clone(),
        id: user.id,
        is_staff: user.is_staff_like(),
        token: issued.token,
    };
    Ok(([(SESSION_HEADER, header)], Json(body)).into_response())
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub status: bool,
    pub message: &'static str,
    pub username: Option<String>,
}

/// `POST /api/auth/logout`: drops the current session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<LogoutResponse>, ApiError> {
    if let Some(session) = &viewer.session {
        let conn = ctx.core.db()?;
        accounts::logout(&conn, session)?;
    }
    Ok(Json(LogoutResponse {
        status: true,
        message: "Logged out successfully!",
        username: viewer.user.map(|u| u.username),
    }))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: chrono::NaiveDateTime,
}

/// `GET /api/auth/profile`
pub async fn profile(Extension(viewer): Extension<Viewer>) -> Result<Json<ProfileResponse>, ApiError> {
    let user = require_user(&viewer)?;
    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
        date_joined: user.date_joined,
    }))
}

/// Largest image the proxy relays.
pub const MAX_PROXY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Absolute URL for the proxy. Paths like `/media/x.jpg` resolve
/// against the request's own host.
fn absolute_image_url(raw: &str, headers: &HeaderMap) -> Result<String, ApiError> {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(raw.to_string());
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Relative URL without Host header".into()))?;
    let path = if raw.starts_with('/') { raw.to_string() } else { format!("/{raw}") };
    Ok(format!("http://{host}{path}"))
}

/// Upstream body, refused once it grows past `limit` bytes.
async fn read_limited(mut upstream: reqwest::Response, limit: usize) -> Result<Bytes, ApiError> {
    let too_large = || ApiError::BadGateway(format!("Image exceeds {limit} bytes"));
    if upstream.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }
    let mut body = Vec::new();
    while let Some(chunk) = upstream
        .chunk()
        .await
        .map_err(|e| ApiError::BadGateway(format!("Error fetching image: {e}")))?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(body))
}

/// `GET /api/auth/proxy-image?url=`: relays a remote image.
pub async fn proxy_image(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No URL provided".into()))?;
    let url = absolute_image_url(raw, &headers)?;

    let upstream = ctx
        .http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| ApiError::BadGateway(format!("Error fetching image: {e}")))?;

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("image/jpeg"));
    let bytes = read_limited(upstream, MAX_PROXY_BYTES).await?;

    tracing::debug!(url = %url, size = bytes.len(), "Proxied image");
    Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
}
