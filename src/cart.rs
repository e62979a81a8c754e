//! Shopping cart, checkout and order history.
//!
//! Signed-in users own one cart; guests get a cart keyed by their session
//! id. Checkout runs every stock decrement inside a single transaction so a
//! failing line leaves stock, cart and orders untouched.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::Viewer;
use crate::db::{self, CartLine, DatabaseError, NewOrder};
use crate::models::{
    Cart, CartItem, Money, Order, OrderItem, OrderStatus, Payment, PaymentStatus, ProductStatus, User, MAX_LINE_QTY,
};
use crate::validation::lenient_i64;

/// Flat shipping fee.
pub const SHIPPING_FEE: Money = Money::ZERO;
pub const PAYMENT_PROVIDER: &str = "DUMMY";

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Invalid product ID")]
    InvalidProductId,
    #[error("Product not found")]
    ProductNotFound,
    #[error("Cannot buy your own product")]
    OwnProduct,
    #[error("Product out of stock")]
    OutOfStock,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Quantity cannot exceed {MAX_LINE_QTY}")]
    QuantityTooLarge,
    #[error("Cart total is too large")]
    AmountOverflow,
    #[error("Cart item not found")]
    ItemNotFound,
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("A session is required to keep a cart")]
    NoSession,
    #[error("{0}")]
    Checkout(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Inputs & view models
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AddItemInput {
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub qty: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateQtyInput {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub item_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub qty: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RemoveItemInput {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub item_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub item_id: i64,
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub thumbnail: String,
    pub qty: i64,
    pub unit_price: Money,
    pub subtotal: Money,
    pub stock: i64,
}

impl TryFrom<&CartLine> for CartLineView {
    type Error = CartError;

    fn try_from(line: &CartLine) -> Result<Self, CartError> {
        Ok(Self {
            item_id: line.item.id,
            product_id: line.item.product_id,
            name: line.name.clone(),
            slug: line.slug.clone(),
            thumbnail: line.thumbnail.clone(),
            qty: line.item.qty,
            unit_price: line.item.unit_price,
            subtotal: line.item.subtotal().ok_or(CartError::AmountOverflow)?,
            stock: line.stock,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartLineView>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub cart_count: i64,
}

impl CartSummary {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Money::ZERO,
            shipping: SHIPPING_FEE,
            total: SHIPPING_FEE,
            cart_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub cart_count: i64,
    pub item_id: i64,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QtyOutcome {
    pub item_id: i64,
    pub qty: i64,
    pub subtotal: Money,
    pub total: Money,
    pub cart_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

/// The viewer's cart, created on demand.
pub fn cart_for(conn: &Connection, viewer: &Viewer) -> Result<Cart, CartError> {
    match (viewer.user_id(), viewer.session_id()) {
        (Some(user_id), _) => Ok(db::get_or_create_user_cart(conn, user_id)?),
        (None, Some(session_id)) => Ok(db::get_or_create_session_cart(conn, session_id)?),
        (None, None) => Err(CartError::NoSession),
    }
}

/// The viewer's cart if one exists.
pub fn find_cart(conn: &Connection, viewer: &Viewer) -> Result<Option<Cart>, DatabaseError> {
    match (viewer.user_id(), viewer.session_id()) {
        (Some(user_id), _) => db::find_user_cart(conn, user_id),
        (None, Some(session_id)) => db::find_session_cart(conn, session_id),
        (None, None) => Ok(None),
    }
}

/// Item count without creating a cart.
pub fn cart_count(conn: &Connection, viewer: &Viewer) -> Result<i64, DatabaseError> {
    match find_cart(conn, viewer)? {
        Some(cart) => db::cart_item_count(conn, cart.id),
        None => Ok(0),
    }
}

pub fn add_item(conn: &Connection, viewer: &Viewer, input: &AddItemInput) -> Result<AddOutcome, CartError> {
    let product_id = input
        .product_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or(CartError::InvalidProductId)?;
    let qty = input.qty.unwrap_or(1);
    if qty < 1 {
        return Err(CartError::InvalidQuantity);
    }
    if qty > MAX_LINE_QTY {
        return Err(CartError::QuantityTooLarge);
    }

    let product = db::get_product(conn, &product_id)?.ok_or(CartError::ProductNotFound)?;
    if viewer.user_id().is_some() && product.created_by == viewer.user_id() {
        return Err(CartError::OwnProduct);
    }
    if !product.in_stock() {
        return Err(CartError::OutOfStock);
    }

    let cart = cart_for(conn, viewer)?;
    let existing = db::find_cart_item_for_product(conn, cart.id, &product.id)?.map_or(0, |i| i.qty);
    if existing + qty > MAX_LINE_QTY {
        return Err(CartError::QuantityTooLarge);
    }
    let item = db::upsert_cart_item(conn, cart.id, &product.id, qty, product.final_price())?;
    let cart_count = db::cart_item_count(conn, cart.id)?;
    tracing::debug!(cart_id = cart.id, product_id = %product.id, qty, "Added to cart");

    Ok(AddOutcome {
        cart_count,
        item_id: item.id,
        qty: item.qty,
    })
}

/// Set a line's quantity, clamped to at least one.
pub fn update_qty(conn: &Connection, viewer: &Viewer, input: &UpdateQtyInput) -> Result<QtyOutcome, CartError> {
    let item_id = input.item_id.ok_or(CartError::ItemNotFound)?;
    let qty = input.qty.unwrap_or(1).max(1);
    if qty > MAX_LINE_QTY {
        return Err(CartError::QuantityTooLarge);
    }
    let cart = find_cart(conn, viewer)?.ok_or(CartError::ItemNotFound)?;
    let mut item = db::get_cart_item(conn, cart.id, item_id)?.ok_or(CartError::ItemNotFound)?;
    db::set_cart_item_qty(conn, item.id, qty)?;
    item.qty = qty;

    let summary = summarize(conn, &cart)?;
    Ok(QtyOutcome {
        item_id: item.id,
        qty,
        subtotal: item.subtotal().ok_or(CartError::AmountOverflow)?,
        total: summary.total,
        cart_count: summary.cart_count,
    })
}

/// Remove a line. Missing lines are ignored.
pub fn remove_item(conn: &Connection, viewer: &Viewer, input: &RemoveItemInput) -> Result<CartSummary, CartError> {
    let Some(cart) = find_cart(conn, viewer)? else {
        return Ok(CartSummary::empty());
    };
    if let Some(item_id) = input.item_id {
        db::delete_cart_item(conn, cart.id, item_id)?;
    }
    summarize(conn, &cart)
}

pub fn clear(conn: &Connection, viewer: &Viewer) -> Result<(), CartError> {
    if let Some(cart) = find_cart(conn, viewer)? {
        db::clear_cart_items(conn, cart.id)?;
    }
    Ok(())
}

/// Subtotal of `lines` and the total with shipping.
fn totals<'a>(lines: impl IntoIterator<Item = &'a CartItem>) -> Result<(Money, Money), CartError> {
    let subtotals = lines
        .into_iter()
        .map(CartItem::subtotal)
        .collect::<Option<Vec<_>>>()
        .ok_or(CartError::AmountOverflow)?;
    let subtotal = Money::checked_sum(subtotals).ok_or(CartError::AmountOverflow)?;
    let total = subtotal.checked_add(SHIPPING_FEE).ok_or(CartError::AmountOverflow)?;
    Ok((subtotal, total))
}

fn summarize(conn: &Connection, cart: &Cart) -> Result<CartSummary, CartError> {
    let lines = db::list_cart_lines(conn, cart.id)?;
    let items = lines.iter().map(CartLineView::try_from).collect::<Result<Vec<_>, _>>()?;
    let (subtotal, total) = totals(lines.iter().map(|l| &l.item))?;
    let cart_count = items.iter().map(|i| i.qty).sum();
    Ok(CartSummary {
        items,
        subtotal,
        shipping: SHIPPING_FEE,
        total,
        cart_count,
    })
}

pub fn summary(conn: &Connection, viewer: &Viewer) -> Result<CartSummary, CartError> {
    match find_cart(conn, viewer)? {
        Some(cart) => summarize(conn, &cart),
        None => Ok(CartSummary::empty()),
    }
}

/// Pay for the whole cart. Every line is checked and its stock decremented
/// in one transaction; the first failing line aborts everything.
pub fn checkout(conn: &Connection, viewer: &Viewer) -> Result<OrderView, CartError> {
    let cart = find_cart(conn, viewer)?.ok_or(CartError::EmptyCart)?;
    let tx = conn.unchecked_transaction()?;

    let lines = db::list_cart_lines(&tx, cart.id)?;
    if lines.is_empty() {
        return Err(CartError::EmptyCart);
    }

    for line in &lines {
        if viewer.user_id().is_some() && line.created_by == viewer.user_id() {
            return Err(CartError::Checkout(format!(
                "You cannot buy your own product: {}",
                line.name
            )));
        }
        if line.status != ProductStatus::Active
            || line.item.qty > line.stock
            || !db::reserve_stock(&tx, &line.item.product_id, line.item.qty)?
        {
            return Err(CartError::Checkout(format!(
                "Not enough stock for {} ({} left)",
                line.name, line.stock
            )));
        }
    }

    let (subtotal, total) = totals(lines.iter().map(|l| &l.item))?;
    let order = db::insert_order(
        &tx,
        &NewOrder {
            user_id: viewer.user_id(),
            status: OrderStatus::Paid,
            subtotal,
            discount: Money::ZERO,
            tax: Money::ZERO,
            shipping: SHIPPING_FEE,
            total,
        },
    )?;
    for line in &lines {
        db::insert_order_item(
            &tx,
            order.id,
            &line.item.product_id,
            &line.name,
            line.item.unit_price,
            line.item.qty,
        )?;
    }
    let payment = db::insert_payment(&tx, order.id, PaymentStatus::Success, PAYMENT_PROVIDER, total)?;
    db::clear_cart_items(&tx, cart.id)?;
    tx.commit()?;

    tracing::info!(order_id = order.id, user_id = ?viewer.user_id(), total = %total, "Checkout complete");
    Ok(OrderView {
        items: db::list_order_items(conn, order.id)?,
        order,
        payment: Some(payment),
    })
}

/// A user's orders, newest first.
pub fn list_orders(conn: &Connection, user: &User) -> Result<Vec<OrderView>, CartError> {
    let orders = db::list_orders_for_user(conn, user.id)?;
    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(OrderView {
            items: db::list_order_items(conn, order.id)?,
            payment: db::get_payment_for_order(conn, order.id)?,
            order,
        });
    }
    Ok(views)
}

impl From<rusqlite::Error> for CartError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}
