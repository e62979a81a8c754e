//! Access-log middleware.
//!
//! Logs every API request with method, path, user id and response
//! status. Runs inside the session resolver so the viewer is known.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::accounts::Viewer;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_id = req.extensions().get::<Viewer>().and_then(Viewer::user_id);
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, path = %path, ?user_id, status, elapsed_ms, "API request");
    } else {
        tracing::info!(%method, path = %path, ?user_id, status, elapsed_ms, "API request");
    }
    response
}
