//! News portal endpoints: articles, categories, comments and reactions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::{parse_uuid, Deleted};
use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload};
use crate::models::{Comment, News, NewsCategory};
use crate::news::{
    self, CommentInput, CommentNode, NewsCategoryInput, NewsDetail, NewsInput, NewsListing, NewsQuery, ReactInput,
    ReactionOutcome,
};

/// `GET /api/news`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<NewsListing>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(news::list_news(&conn, &query)?))
}

/// `POST /api/news`: staff only.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<NewsInput>,
) -> Result<(StatusCode, Json<News>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let created = news::create_news(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/news/:id`: counts a view.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<NewsDetail>, ApiError> {
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    Ok(Json(news::news_detail(&conn, &id, &viewer)?))
}

/// `PUT /api/news/:id`: author or staff.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<NewsInput>,
) -> Result<Json<News>, ApiError> {
    require_user(&viewer)?;
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    Ok(Json(news::update_news(&conn, &viewer, &id, &input)?))
}

/// `DELETE /api/news/:id`: author or staff.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    require_user(&viewer)?;
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    news::delete_news(&conn, &viewer, &id)?;
    Ok(Json(Deleted::new(id)))
}

// ── Categories ──────────────────────────────────────────────

/// `GET /api/news/categories`
pub async fn categories(State(ctx): State<ApiContext>) -> Result<Json<Vec<NewsCategory>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(news::list_categories(&conn)?))
}

/// `POST /api/news/categories`: staff only.
pub async fn add_category(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<NewsCategoryInput>,
) -> Result<(StatusCode, Json<NewsCategory>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let category = news::add_category(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(category)))
}

// ── Comments & reactions ────────────────────────────────────

/// `GET /api/news/:id/comments`: threaded.
pub async fn comments(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    Ok(Json(news::comment_thread(&conn, &id, &viewer)?))
}

/// `POST /api/news/:id/comments`
pub async fn add_comment(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<CommentInput>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    let comment = news::create_comment(&conn, &viewer, user, &id, &input)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// `DELETE /api/news/comments/:id`
pub async fn delete_comment(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
) -> Result<Json<Deleted>, ApiError> {
    require_user(&viewer)?;
    let conn = ctx.core.db()?;
    news::delete_comment(&conn, &viewer, id)?;
    Ok(Json(Deleted::new(id)))
}

/// `POST /api/news/:id/react`: toggles the caller's reaction.
pub async fn react(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<ReactInput>,
) -> Result<Json<ReactionOutcome>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "News")?;
    let conn = ctx.core.db()?;
    Ok(Json(news::react(&conn, &viewer, user, &id, &input)?))
}
