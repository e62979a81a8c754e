//! Shop endpoints: products, reviews, categories and brands.
//!
//! Product routes take a `:key` that is either the product UUID or its slug.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::{parse_uuid, Deleted};
use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload};
use crate::models::{Brand, Category, Review};
use crate::shop::{
    self, BrandInput, CategoryInput, ProductDetail, ProductInput, ProductListing, ProductQuery, ReviewInput,
    ReviewOutcome,
};

// ── Products ────────────────────────────────────────────────

/// `GET /api/shop/products`
pub async fn list_products(
    State(ctx): State<ApiContext>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductListing>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shop::list_products(&conn, &query)?))
}

/// `POST /api/shop/products`: any signed-in user becomes the seller.
pub async fn create_product(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<ProductInput>,
) -> Result<(StatusCode, Json<ProductDetail>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let detail = shop::create_product(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /api/shop/products/:key`
pub async fn product_detail(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(key): Path<String>,
) -> Result<Json<ProductDetail>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shop::product_detail(&conn, &key, &viewer)?))
}

/// `PUT /api/shop/products/:key`: owner or staff.
pub async fn update_product(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(key): Path<String>,
    Payload(input): Payload<ProductInput>,
) -> Result<Json<ProductDetail>, ApiError> {
    require_user(&viewer)?;
    let conn = ctx.core.db()?;
    Ok(Json(shop::update_product(&conn, &viewer, &key, &input)?))
}

/// `DELETE /api/shop/products/:key`: owner or staff.
pub async fn delete_product(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(key): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let id = shop::delete_product(&conn, &viewer, &key)?;
    Ok(Json(Deleted::new(id)))
}

// ── Reviews ─────────────────────────────────────────────────

/// `GET /api/shop/products/:key/reviews`
pub async fn list_reviews(
    State(ctx): State<ApiContext>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shop::list_reviews(&conn, &key)?))
}

/// `POST /api/shop/products/:key/reviews`
pub async fn create_review(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(key): Path<String>,
    Payload(input): Payload<ReviewInput>,
) -> Result<(StatusCode, Json<ReviewOutcome>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let outcome = shop::create_review(&conn, user, &key, &input)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `DELETE /api/shop/reviews/:id`: author or staff.
pub async fn delete_review(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<ReviewOutcome>, ApiError> {
    require_user(&viewer)?;
    let id = parse_uuid(&id, "Review")?;
    let conn = ctx.core.db()?;
    Ok(Json(shop::delete_review(&conn, &viewer, &id)?))
}

// ── Categories ──────────────────────────────────────────────

/// `GET /api/shop/categories`
pub async fn list_categories(State(ctx): State<ApiContext>) -> Result<Json<Vec<Category>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shop::list_categories(&conn)?))
}

/// `POST /api/shop/categories`: staff only.
pub async fn create_category(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let category = shop::create_category(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PUT /api/shop/categories/:id`: staff only.
pub async fn update_category(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Category")?;
    let conn = ctx.core.db()?;
    Ok(Json(shop::update_category(&conn, user, &id, &input)?))
}

/// `DELETE /api/shop/categories/:id`: staff only; refused while products use it.
pub async fn delete_category(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Category")?;
    let conn = ctx.core.db()?;
    shop::delete_category(&conn, user, &id)?;
    Ok(Json(Deleted::new(id)))
}

// ── Brands ──────────────────────────────────────────────────

/// `GET /api/shop/brands`
pub async fn list_brands(State(ctx): State<ApiContext>) -> Result<Json<Vec<Brand>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shop::list_brands(&conn)?))
}

/// `POST /api/shop/brands`: staff only.
pub async fn create_brand(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<BrandInput>,
) -> Result<(StatusCode, Json<Brand>), ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    let brand = shop::create_brand(&conn, user, &input)?;
    Ok((StatusCode::CREATED, Json(brand)))
}

/// `PUT /api/shop/brands/:id`: staff only.
pub async fn update_brand(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
    Payload(input): Payload<BrandInput>,
) -> Result<Json<Brand>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Brand")?;
    let conn = ctx.core.db()?;
    Ok(Json(shop::update_brand(&conn, user, &id, &input)?))
}

/// `DELETE /api/shop/brands/:id`: staff only; products keep existing without a brand.
pub async fn delete_brand(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let user = require_user(&viewer)?;
    let id = parse_uuid(&id, "Brand")?;
    let conn = ctx.core.db()?;
    shop::delete_brand(&conn, user, &id)?;
    Ok(Json(Deleted::new(id)))
}
