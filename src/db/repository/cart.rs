use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, uuid_col};
use crate::db::{now, DatabaseError};
use crate::models::*;

// ═══════════════════════════════════════════════════════════
// Carts
// ═══════════════════════════════════════════════════════════

fn cart_from_row(row: &Row<'_>) -> rusqlite::Result<Cart> {
    Ok(Cart {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn find_user_cart(conn: &Connection, user_id: i64) -> Result<Option<Cart>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, session_id, created_at FROM carts WHERE user_id = ?1",
            params![user_id],
            cart_from_row,
        )
        .optional()?)
}

pub fn find_session_cart(conn: &Connection, session_id: &str) -> Result<Option<Cart>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, session_id, created_at FROM carts
             WHERE session_id = ?1 AND user_id IS NULL",
            params![session_id],
            cart_from_row,
        )
        .optional()?)
}

pub fn get_or_create_user_cart(conn: &Connection, user_id: i64) -> Result<Cart, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO carts (user_id, created_at) VALUES (?1, ?2)",
        params![user_id, now()],
    )?;
    find_user_cart(conn, user_id)?.ok_or_else(|| DatabaseError::not_found("Cart", user_id))
}

pub fn get_or_create_session_cart(conn: &Connection, session_id: &str) -> Result<Cart, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO carts (session_id, created_at) VALUES (?1, ?2)",
        params![session_id, now()],
    )?;
    find_session_cart(conn, session_id)?.ok_or_else(|| DatabaseError::not_found("Cart", session_id))
}

pub fn delete_cart(conn: &Connection, cart_id: i64) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM carts WHERE id = ?1", params![cart_id])?;
    Ok(())
}

// ── Items ───────────────────────────────────────────────────

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CartItem> {
    Ok(CartItem {
        id: row.get(0)?,
        cart_id: row.get(1)?,
        product_id: uuid_col(row, 2)?,
        qty: row.get(3)?,
        unit_price: row.get(4)?,
    })
}

pub fn get_cart_item(
    conn: &Connection,
    cart_id: i64,
    item_id: i64,
) -> Result<Option<CartItem>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, cart_id, product_id, qty, unit_price FROM cart_items
             WHERE id = ?1 AND cart_id = ?2",
            params![item_id, cart_id],
            item_from_row,
        )
        .optional()?)
}

/// Add `qty` of a product, summing into an existing line. The unit price is
/// always refreshed to `unit_price`.
pub fn find_cart_item_for_product(
    conn: &Connection,
    cart_id: i64,
    product_id: &Uuid,
) -> Result<Option<CartItem>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, cart_id, product_id, qty, unit_price FROM cart_items
             WHERE cart_id = ?1 AND product_id = ?2",
            params![cart_id, product_id.to_string()],
            item_from_row,
        )
        .optional()?)
}

pub fn upsert_cart_item(
    conn: &Connection,
    cart_id: i64,
    product_id: &Uuid,
    qty: i64,
    unit_price: Money,
) -> Result<CartItem, DatabaseError> {
    conn.execute(
        "INSERT INTO cart_items (cart_id, product_id, qty, unit_price) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (cart_id, product_id)
         DO UPDATE SET qty = qty + excluded.qty, unit_price = excluded.unit_price",
        params![cart_id, product_id.to_string(), qty, unit_price],
    )?;
    conn.query_row(
        "SELECT id, cart_id, product_id, qty, unit_price FROM cart_items
         WHERE cart_id = ?1 AND product_id = ?2",
        params![cart_id, product_id.to_string()],
        item_from_row,
    )
    .map_err(DatabaseError::from)
}

pub fn set_cart_item_qty(conn: &Connection, item_id: i64, qty: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE cart_items SET qty = ?1 WHERE id = ?2",
        params![qty, item_id],
    )?;
    Ok(())
}

pub fn delete_cart_item(conn: &Connection, cart_id: i64, item_id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM cart_items WHERE id = ?1 AND cart_id = ?2",
        params![item_id, cart_id],
    )?;
    Ok(changed > 0)
}

pub fn clear_cart_items(conn: &Connection, cart_id: i64) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![cart_id])?;
    Ok(())
}

/// Cart line joined with the product fields needed for display and checkout.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item: CartItem,
    pub name: String,
    pub slug: String,
    pub thumbnail: String,
    pub stock: i64,
    pub status: ProductStatus,
    pub created_by: Option<i64>,
}

pub fn list_cart_lines(conn: &Connection, cart_id: i64) -> Result<Vec<CartLine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT ci.id, ci.cart_id, ci.product_id, ci.qty, ci.unit_price,
                p.name, p.slug, p.thumbnail, p.stock, p.status, p.created_by
         FROM cart_items ci JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = ?1 ORDER BY ci.id",
    )?;
    let rows = stmt.query_map(params![cart_id], |row| {
        Ok(CartLine {
            item: item_from_row(row)?,
            name: row.get(5)?,
            slug: row.get(6)?,
            thumbnail: row.get(7)?,
            stock: row.get(8)?,
            status: enum_col(row, 9)?,
            created_by: row.get(10)?,
        })
    })?;
    let mut lines = Vec::new();
    for row in rows {
        lines.push(row?);
    }
    Ok(lines)
}

/// Sum of quantities in a cart.
pub fn cart_item_count(conn: &Connection, cart_id: i64) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(qty), 0) FROM cart_items WHERE cart_id = ?1",
        params![cart_id],
        |row| row.get(0),
    )?)
}

/// Move every line of `from` into `into`, summing quantities per product,
/// then delete `from`. Caller supplies the transaction.
/// Move every line of cart `from` into `into`, summing quantities per
/// product. Summed quantities are capped at [`MAX_LINE_QTY`].
pub fn merge_carts(conn: &Connection, from: i64, into: i64) -> Result<usize, DatabaseError> {
    let moved = conn.execute(
        "INSERT INTO cart_items (cart_id, product_id, qty, unit_price)
         SELECT ?2, product_id, MIN(qty, ?3), unit_price FROM cart_items WHERE cart_id = ?1 AND true
         ON CONFLICT (cart_id, product_id) DO UPDATE SET qty = MIN(qty + excluded.qty, ?3)",
        params![from, into, MAX_LINE_QTY],
    )?;
    delete_cart(conn, from)?;
    Ok(moved)
}

// ═══════════════════════════════════════════════════════════
// Orders & payments
// ═══════════════════════════════════════════════════════════

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: enum_col(row, 2)?,
        subtotal: row.get(3)?,
        discount: row.get(4)?,
        tax: row.get(5)?,
        shipping: row.get(6)?,
        total: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub struct NewOrder {
    pub user_id: Option<i64>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

pub fn insert_order(conn: &Connection, new: &NewOrder) -> Result<Order, DatabaseError> {
    let at = now();
    conn.execute(
        "INSERT INTO orders (user_id, status, subtotal, discount, tax, shipping, total, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.user_id,
            new.status.as_str(),
            new.subtotal,
            new.discount,
            new.tax,
            new.shipping,
            new.total,
            at
        ],
    )?;
    Ok(Order {
        id: conn.last_insert_rowid(),
        user_id: new.user_id,
        status: new.status,
        subtotal: new.subtotal,
        discount: new.discount,
        tax: new.tax,
        shipping: new.shipping,
        total: new.total,
        created_at: at,
    })
}

pub fn insert_order_item(
    conn: &Connection,
    order_id: i64,
    product_id: &Uuid,
    name_snapshot: &str,
    price_snapshot: Money,
    qty: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO order_items (order_id, product_id, name_snapshot, price_snapshot, qty)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![order_id, product_id.to_string(), name_snapshot, price_snapshot, qty],
    )?;
    Ok(())
}

pub fn insert_payment(
    conn: &Connection,
    order_id: i64,
    status: PaymentStatus,
    provider: &str,
    amount: Money,
) -> Result<Payment, DatabaseError> {
    let at = now();
    conn.execute(
        "INSERT INTO payments (order_id, status, provider, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![order_id, status.as_str(), provider, amount, at],
    )?;
    Ok(Payment {
        id: conn.last_insert_rowid(),
        order_id,
        status,
        provider: provider.to_string(),
        amount,
        created_at: at,
    })
}

/// Orders of a user, newest first.
pub fn list_orders_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Order>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, status, subtotal, discount, tax, shipping, total, created_at
         FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![user_id], order_from_row)?;
    let mut orders = Vec::new();
    for row in rows {
        orders.push(row?);
    }
    Ok(orders)
}

pub fn list_order_items(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, product_id, name_snapshot, price_snapshot, qty
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![order_id], |row| {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            product_id: uuid_col(row, 2)?,
            name_snapshot: row.get(3)?,
            price_snapshot: row.get(4)?,
            qty: row.get(5)?,
        })
    })?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn get_payment_for_order(conn: &Connection, order_id: i64) -> Result<Option<Payment>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, order_id, status, provider, amount, created_at FROM payments WHERE order_id = ?1",
            params![order_id],
            |row| {
                Ok(Payment {
                    id: row.get(0)?,
                    order_id: row.get(1)?,
                    status: enum_col(row, 2)?,
                    provider: row.get(3)?,
                    amount: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?)
}

/// True when the user has a paid order containing the product.
pub fn has_purchased(conn: &Connection, user_id: i64, product_id: &Uuid) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_items oi JOIN orders o ON o.id = oi.order_id
         WHERE o.user_id = ?1 AND oi.product_id = ?2 AND o.status = 'PAID'",
        params![user_id, product_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::{fixtures, insert_session};
    use chrono::Duration;

    #[test]
    fn upsert_sums_quantity_and_refreshes_price() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        let product = fixtures::product(&conn, cat.id, "Runner", 10_000, 9, None);
        let cart = get_or_create_user_cart(&conn, user.id).unwrap();

        upsert_cart_item(&conn, cart.id, &product.id, 2, Money(10_000)).unwrap();
        let item = upsert_cart_item(&conn, cart.id, &product.id, 3, Money(9_000)).unwrap();
        assert_eq!(item.qty, 5);
        assert_eq!(item.unit_price, Money(9_000));
        assert_eq!(cart_item_count(&conn, cart.id).unwrap(), 5);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let a = get_or_create_user_cart(&conn, user.id).unwrap();
        let b = get_or_create_user_cart(&conn, user.id).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn merge_sums_per_product() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        insert_session(&conn, "guest", None, crate::db::now() + Duration::hours(1)).unwrap();
        let cat = fixtures::category(&conn, "Shoes");
        let shared = fixtures::product(&conn, cat.id, "Runner", 10_000, 9, None);
        let only_guest = fixtures::product(&conn, cat.id, "Sprinter", 20_000, 9, None);

        let guest = get_or_create_session_cart(&conn, "guest").unwrap();
        let owned = get_or_create_user_cart(&conn, user.id).unwrap();
        upsert_cart_item(&conn, guest.id, &shared.id, 2, Money(10_000)).unwrap();
        upsert_cart_item(&conn, guest.id, &only_guest.id, 1, Money(20_000)).unwrap();
        upsert_cart_item(&conn, owned.id, &shared.id, 1, Money(10_000)).unwrap();

        merge_carts(&conn, guest.id, owned.id).unwrap();

        let lines = list_cart_lines(&conn, owned.id).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(cart_item_count(&conn, owned.id).unwrap(), 4);
        assert!(find_session_cart(&conn, "guest").unwrap().is_none());
    }

    #[test]
    fn merge_caps_line_quantity() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        insert_session(&conn, "guest", None, crate::db::now() + Duration::hours(1)).unwrap();
        let cat = fixtures::category(&conn, "Shoes");
        let runner = fixtures::product(&conn, cat.id, "Runner", 10_000, 9, None);

        let guest = get_or_create_session_cart(&conn, "guest").unwrap();
        let owned = get_or_create_user_cart(&conn, user.id).unwrap();
        upsert_cart_item(&conn, guest.id, &runner.id, MAX_LINE_QTY, Money(10_000)).unwrap();
        upsert_cart_item(&conn, owned.id, &runner.id, 5, Money(10_000)).unwrap();

        merge_carts(&conn, guest.id, owned.id).unwrap();

        let line = find_cart_item_for_product(&conn, owned.id, &runner.id).unwrap().unwrap();
        assert_eq!(line.qty, MAX_LINE_QTY);
    }

    #[test]
    fn orders_listed_newest_first() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        for total in [100, 200] {
            let order = insert_order(
                &conn,
                &NewOrder {
                    user_id: Some(user.id),
                    status: OrderStatus::Paid,
                    subtotal: Money(total),
                    discount: Money::ZERO,
                    tax: Money::ZERO,
                    shipping: Money::ZERO,
                    total: Money(total),
                },
            )
            .unwrap();
            insert_payment(&conn, order.id, PaymentStatus::Success, "DUMMY", Money(total)).unwrap();
        }
        let orders = list_orders_for_user(&conn, user.id).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].total, Money(200));
        let payment = get_payment_for_order(&conn, orders[0].id).unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
    }
}
