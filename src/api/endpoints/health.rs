//! Health check and greeting.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// `GET /api/health`: liveness plus a database round trip.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = {
        let conn = ctx.core.db()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
    };

    Ok(Json(HealthResponse {
        status: "ok",
        app: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        database,
    }))
}

#[derive(Serialize)]
pub struct HelloResponse {
    pub message: String,
}

/// `GET /api/hello`
pub async fn hello(Extension(viewer): Extension<Viewer>) -> Result<Json<HelloResponse>, ApiError> {
    let user = require_user(&viewer)?;
    Ok(Json(HelloResponse {
        message: format!("Hello, {}!", user.username),
    }))
}
