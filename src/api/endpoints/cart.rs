//! Cart, checkout and order history.
//!
//! Cart routes work for guests too; the cart follows the session.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::accounts::Viewer;
use crate::api::error::ApiError;
use crate::api::types::{require_user, ApiContext, Payload};
use crate::cart::{self, AddItemInput, AddOutcome, CartSummary, OrderView, QtyOutcome, RemoveItemInput, UpdateQtyInput};

/// `GET /api/cart` and `GET /api/cart/checkout`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<CartSummary>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(cart::summary(&conn, &viewer)?))
}

/// `POST /api/cart/add`
pub async fn add(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<AddItemInput>,
) -> Result<Json<AddOutcome>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(cart::add_item(&conn, &viewer, &input)?))
}

/// `POST /api/cart/update`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<UpdateQtyInput>,
) -> Result<Json<QtyOutcome>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(cart::update_qty(&conn, &viewer, &input)?))
}

/// `POST /api/cart/remove`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
    Payload(input): Payload<RemoveItemInput>,
) -> Result<Json<CartSummary>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(cart::remove_item(&conn, &viewer, &input)?))
}

/// `POST /api/cart/clear`
pub async fn clear(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<CartSummary>, ApiError> {
    let conn = ctx.core.db()?;
    cart::clear(&conn, &viewer)?;
    Ok(Json(cart::summary(&conn, &viewer)?))
}

/// `POST /api/cart/checkout`: places a paid order from the whole cart.
pub async fn checkout(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let conn = ctx.core.db()?;
    let order = cart::checkout(&conn, &viewer)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders`
pub async fn orders(
    State(ctx): State<ApiContext>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let user = require_user(&viewer)?;
    let conn = ctx.core.db()?;
    Ok(Json(cart::list_orders(&conn, user)?))
}
