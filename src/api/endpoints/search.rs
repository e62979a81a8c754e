//! Search endpoints: results, recent queries, presets and analytics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::{parse_uuid, Deleted};
use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload};
use crate::models::{RecentSearch, SearchPreference};
use crate::search::{
    self, FilterOptions, PresetInput, SearchAnalytics, SearchCriteria, SearchOverview, SearchResults,
};

/// `GET /api/search/results`: also records the query.
pub async fn results(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Query(criteria): Query<SearchCriteria>,
) -> Result<Json<SearchResults>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(search::search(&conn, &viewer, &criteria)?))
}

/// `GET /api/search/recent`
pub async fn recent(Extension(viewer): Extension<Viewer>) -> Json<Vec<RecentSearch>> {
    Json(search::recent(&viewer))
}

/// `GET /api/search/filter-options`
pub async fn filter_options(State(ctx): State<ApiContext>) -> Result<Json<FilterOptions>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(search::filter_options(&conn)?))
}

/// `GET /api/search/overview`: landing data for the search page.
pub async fn overview(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<SearchOverview>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(search::overview(&conn, &viewer)?))
}

// ── Presets ─────────────────────────────────────────────────

/// `GET /api/search/preferences`: presets the caller may apply.
pub async fn presets(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<SearchPreference>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(search::available_presets(&conn, &viewer)?))
}

/// `POST /api/search/preferences`
pub async fn create_preset(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<PresetInput>,
) -> Result<(StatusCode, Json<SearchPreference>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let preset = search::save_preset(&conn, user, None, &input)?;
    Ok((StatusCode::CREATED, Json(preset)))
}

/// `PUT /api/search/preferences/:id`: owner only.
pub async fn update_preset(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<PresetInput>,
) -> Result<Json<SearchPreference>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Preset")?;
    let conn = ctx.core.db()?;
    Ok(Json(search::save_preset(&conn, user, Some(&id), &input)?))
}

/// `DELETE /api/search/preferences/:id`: owner only.
pub async fn delete_preset(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Preset")?;
    let conn = ctx.core.db()?;
    search::delete_preset(&conn, user, &id)?;
    Ok(Json(Deleted::new(id)))
}

/// `GET /api/search/analytics`: staff only.
pub async fn analytics(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<SearchAnalytics>, ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    Ok(Json(search::analytics(&conn, user)?))
}
