//! Shop: catalog, taxonomy, reviews and product import.

mod import;
mod products;
mod reviews;
mod taxonomy;

pub use import::*;
pub use products::*;
pub use reviews::*;
pub use taxonomy::*;

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError, ProductRow};
use crate::models::{Money, Product, User};
use crate::validation::FieldErrors;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    InUse(String),
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Not enough stock for {0}")]
    InsufficientStock(String),
    #[error("Import failed: {0}")]
    Import(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for ShopError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Lowercase ASCII slug. Runs of any other characters collapse to one `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// First of `base`, `base-2`, `base-3`, … not used by another product.
pub fn unique_product_slug(
    conn: &Connection,
    base: &str,
    exclude: Option<&Uuid>,
) -> Result<String, DatabaseError> {
    let base = if base.is_empty() { "product" } else { base };
    let mut candidate = base.to_string();
    let mut i = 1;
    while db::product_slug_taken(conn, &candidate, exclude)? {
        i += 1;
        candidate = format!("{base}-{i}");
    }
    Ok(candidate)
}

pub(crate) fn require_staff(user: &User) -> Result<(), ShopError> {
    if user.is_staff_like() {
        Ok(())
    } else {
        Err(ShopError::Forbidden("Staff access required".into()))
    }
}

// ═══════════════════════════════════════════════════════════
// View models
// ═══════════════════════════════════════════════════════════

/// Product as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductCard {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub thumbnail: String,
    pub category: String,
    pub brand: Option<String>,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub final_price: Money,
    pub currency: String,
    pub discount_percent: i64,
    pub in_stock: bool,
    pub is_featured: bool,
    pub rating_avg: f64,
    pub rating_count: i64,
}

impl From<&ProductRow> for ProductCard {
    fn from(row: &ProductRow) -> Self {
        let p: &Product = &row.product;
        Self {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            thumbnail: p.thumbnail.clone(),
            category: row.category_name.clone(),
            brand: row.brand_name.clone(),
            price: p.price,
            sale_price: p.sale_price,
            final_price: p.final_price(),
            currency: p.currency.clone(),
            discount_percent: p.discount_percent(),
            in_stock: p.in_stock(),
            is_featured: p.is_featured,
            rating_avg: p.rating_avg,
            rating_count: p.rating_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Nike Air Max 90"), "nike-air-max-90");
        assert_eq!(slugify("  Jersey -- Home/Away  "), "jersey-home-away");
        assert_eq!(slugify("Été 2024!"), "t-2024");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let conn = open_memory_database().unwrap();
        let cat = fixtures::category(&conn, "Shoes");
        let first = fixtures::product(&conn, cat.id, "Runner", 100, 1, None);
        assert_eq!(unique_product_slug(&conn, "runner", None).unwrap(), "runner-2");
        assert_eq!(unique_product_slug(&conn, "runner", Some(&first.id)).unwrap(), "runner");
        assert_eq!(unique_product_slug(&conn, "", None).unwrap(), "product");
    }
}
