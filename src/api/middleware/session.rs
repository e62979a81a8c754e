//! Session resolution middleware.
//!
//! `resolve_session` reads the token from `Authorization: Bearer <token>`
//! (or the `X-Session-Token` header), opens the session and injects the
//! [`Viewer`] into request extensions. It never writes: requests without
//! a live token run as a session-less guest.
//!
//! `ensure_session` sits on the routes that store guest state (adding to
//! the cart, running a search). It issues a guest session when the viewer
//! has none and returns its token in `X-Session-Token`.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::accounts::{self, Viewer};
use crate::api::error::ApiError;
use crate::api::types::{session_token, ApiContext, SESSION_HEADER};

pub async fn resolve_session(req: Request<axum::body::Body>, next: Next) -> Response {
    match resolve_session_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

fn api_context(req: &Request<axum::body::Body>) -> Result<ApiContext, ApiError> {
    req.extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))
}

async fn resolve_session_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = api_context(&req)?;

    let viewer = match session_token(req.headers()) {
        Some(token) => {
            // The connection guard must not live across `next.run`.
            let conn = ctx.core.db()?;
            match accounts::open_session(&conn, &token, ctx.core.session_ttl())? {
                Some(session) => accounts::viewer_for(&conn, session)?,
                None => {
                    tracing::debug!("Stale session token");
                    Viewer::default()
                }
            }
        }
        None => Viewer::default(),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

pub async fn ensure_session(req: Request<axum::body::Body>, next: Next) -> Response {
    match ensure_session_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn ensure_session_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let has_session = req
        .extensions()
        .get::<Viewer>()
        .is_some_and(|viewer| viewer.session.is_some());
    if has_session {
        return Ok(next.run(req).await);
    }

    let ctx = api_context(&req)?;
    let issued = {
        let conn = ctx.core.db()?;
        accounts::issue_session(&conn, None, ctx.core.session_ttl())?
    };
    tracing::debug!("Issued guest session");
    req.extensions_mut().insert(Viewer::anonymous(issued.session));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&issued.token) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}
