//! Live scoreboard endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::Deleted;
use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload};
use crate::scoreboard::{self, Board, ScoreFilter, ScoreboardInput, ScoreboardView};

fn match_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::NotFound("Scoreboard not found".into()))
}

/// `GET /api/scoreboard?status=&sport=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(filter): Query<ScoreFilter>,
) -> Result<Json<Vec<ScoreboardView>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(scoreboard::filter_scores(&conn, &filter)?))
}

/// `GET /api/scoreboard/board`: live, finished and upcoming groups.
pub async fn board(State(ctx): State<ApiContext>) -> Result<Json<Board>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(scoreboard::board(&conn)?))
}

/// `POST /api/scoreboard`: staff only.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<ScoreboardInput>,
) -> Result<(StatusCode, Json<ScoreboardView>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let view = scoreboard::create_score(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `PUT /api/scoreboard/:id`: staff only, replaces every field.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<ScoreboardInput>,
) -> Result<Json<ScoreboardView>, ApiError> {
    let user = require_user(&viewer)?;
    let id = match_id(&id)?;
    let conn = ctx.core.db()?;
    Ok(Json(scoreboard::update_score(&conn, user, id, &input)?))
}

/// `DELETE /api/scoreboard/:id`: staff only.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let user = require_user(&viewer)?;
    let id = match_id(&id)?;
    let conn = ctx.core.db()?;
    scoreboard::delete_score(&conn, user, id)?;
    Ok(Json(Deleted::new(id)))
}
