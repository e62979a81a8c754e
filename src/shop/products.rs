use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{slugify, unique_product_slug, ProductCard, ShopError};
use crate::accounts::Viewer;
use crate::db::{self, DatabaseError, ProductFilter, ProductRow, ProductSort};
use crate::models::{
    page_number, Money, Page, PageWindow, Product, ProductImage, ProductStatus, Review, User,
};
use crate::validation::{self, clearable_money, double_option, lenient_bool, lenient_i64, lenient_money, FieldErrors};

pub const PRODUCT_PAGE_SIZE: i64 = 6;
const DETAIL_REVIEW_LIMIT: i64 = 10;
const NAME_MAX: usize = 200;

// ═══════════════════════════════════════════════════════════
// Listing & detail
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub page: Page<ProductCard>,
    pub sort: &'static str,
    pub category: Option<String>,
}

/// Active products, six per page. Out-of-range pages clamp to the last one.
pub fn list_products(conn: &Connection, query: &ProductQuery) -> Result<ProductListing, ShopError> {
    let sort = ProductSort::parse(query.sort.as_deref());
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let mut filter = ProductFilter {
        status: Some(ProductStatus::Active),
        category_slug: category.clone(),
        query: query.q.clone(),
        sort,
        ..ProductFilter::default()
    };

    let total = db::count_products(conn, &filter)?;
    let window = PageWindow::clamp(page_number(query.page.as_deref()), PRODUCT_PAGE_SIZE, total);
    filter.limit = window.limit;
    filter.offset = window.offset;
    let rows = db::list_products(conn, &filter)?;
    let cards = rows.iter().map(ProductCard::from).collect();

    Ok(ProductListing {
        page: window.into_page(cards, total),
        sort: sort.as_str(),
        category,
    })
}

/// Look a product up by UUID or by slug.
pub fn resolve_product(conn: &Connection, key: &str) -> Result<Option<ProductRow>, DatabaseError> {
    match Uuid::parse_str(key) {
        Ok(id) => db::get_product_row(conn, &id),
        Err(_) => db::get_product_row_by_slug(conn, key),
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub card: ProductCard,
    pub category_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub description: String,
    pub stock: i64,
    pub total_sold: i64,
    pub status: ProductStatus,
    pub created_by: Option<i64>,
    pub images: Vec<ProductImage>,
    pub reviews: Vec<Review>,
    pub can_edit: bool,
}

fn detail_for(conn: &Connection, row: &ProductRow, viewer: Option<&Viewer>) -> Result<ProductDetail, ShopError> {
    let p = &row.product;
    Ok(ProductDetail {
        card: ProductCard::from(row),
        category_id: p.category_id,
        brand_id: p.brand_id,
        description: p.description.clone(),
        stock: p.stock,
        total_sold: p.total_sold,
        status: p.status,
        created_by: p.created_by,
        images: db::list_product_images(conn, &p.id)?,
        reviews: db::list_reviews(conn, &p.id, Some(DETAIL_REVIEW_LIMIT))?,
        can_edit: viewer.is_some_and(|v| v.can_manage(p.created_by)),
    })
}

/// Active product with images and the ten latest reviews. Owners and staff
/// also see their inactive products.
pub fn product_detail(conn: &Connection, key: &str, viewer: &Viewer) -> Result<ProductDetail, ShopError> {
    let row = resolve_product(conn, key)?.ok_or(ShopError::NotFound("Product"))?;
    if row.product.status != ProductStatus::Active && !viewer.can_manage(row.product.created_by) {
        return Err(ShopError::NotFound("Product"));
    }
    detail_for(conn, &row, Some(viewer))
}

// ═══════════════════════════════════════════════════════════
// Create / update / delete
// ═══════════════════════════════════════════════════════════

/// Product form. On update, absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    /// Category UUID or slug.
    pub category: Option<String>,
    /// Brand UUID or name; explicit null or empty clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub brand: Option<Option<String>>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub price: Option<Money>,
    /// Explicit null or blank clears the sale price.
    #[serde(default, deserialize_with = "clearable_money")]
    pub sale_price: Option<Option<Money>>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stock: Option<i64>,
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_featured: Option<bool>,
    pub status: Option<String>,
}

fn resolve_category(conn: &Connection, key: &str) -> Result<Option<Uuid>, DatabaseError> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(db::get_category(conn, &id)?.map(|c| c.id));
    }
    Ok(db::get_category_by_slug(conn, key)?.map(|c| c.id))
}

fn resolve_brand(conn: &Connection, key: &str) -> Result<Option<Uuid>, DatabaseError> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(db::get_brand(conn, &id)?.map(|b| b.id));
    }
    Ok(db::get_brand_by_name(conn, key)?.map(|b| b.id))
}

/// Merge `input` over `base` (or a blank product) and validate the result.
fn apply_input(
    conn: &Connection,
    input: &ProductInput,
    base: Option<&Product>,
    owner: Option<i64>,
) -> Result<Product, ShopError> {
    let mut errors = FieldErrors::new();
    let at = db::now();

    let name = match (&input.name, base) {
        (None, Some(b)) => b.name.clone(),
        (name, _) => validation::required_text(&mut errors, "name", name.as_deref(), NAME_MAX),
    };

    let category_id = match (&input.category, base) {
        (None, Some(b)) => Some(b.category_id),
        (Some(key), _) if !key.trim().is_empty() => {
            let found = resolve_category(conn, key)?;
            if found.is_none() {
                errors.add("category", "Select a valid choice. That choice is not one of the available choices.");
            }
            found
        }
        _ => {
            errors.add("category", "This field is required.");
            None
        }
    };

    let brand_id = match (&input.brand, base) {
        (None, Some(b)) => b.brand_id,
        (None, None) | (Some(None), _) => None,
        (Some(Some(key)), _) if key.trim().is_empty() => None,
        (Some(Some(key)), _) => {
            let found = resolve_brand(conn, key)?;
            if found.is_none() {
                errors.add("brand", "Select a valid choice. That choice is not one of the available choices.");
            }
            found
        }
    };

    let description = match (&input.description, base) {
        (None, Some(b)) => b.description.clone(),
        (d, _) => d.as_deref().map(str::trim).unwrap_or_default().to_string(),
    };

    let price = match (input.price, base) {
        (None, Some(b)) => b.price,
        (Some(p), _) => p,
        (None, None) => {
            errors.add("price", "This field is required.");
            Money::ZERO
        }
    };
    if price.is_negative() {
        errors.add("price", "Ensure this value is greater than or equal to 0.");
    }

    let sale_price = match (input.sale_price, base) {
        (None, Some(b)) => b.sale_price,
        (None, None) => None,
        (Some(s), _) => s,
    };
    if let Some(sale) = sale_price {
        if sale.is_negative() {
            errors.add("sale_price", "Ensure this value is greater than or equal to 0.");
        } else if sale > price {
            errors.add("sale_price", "Sale price cannot be higher than the price.");
        }
    }

    let currency = match (&input.currency, base) {
        (None, Some(b)) => b.currency.clone(),
        (None, None) => "IDR".to_string(),
        (Some(c), _) => {
            let c = c.trim().to_ascii_uppercase();
            if c.len() != 3 || !c.bytes().all(|b| b.is_ascii_alphabetic()) {
                errors.add("currency", "Use a three-letter currency code.");
            }
            c
        }
    };

    let stock = input.stock.or(base.map(|b| b.stock)).unwrap_or(0);
    if stock < 0 {
        errors.add("stock", "Ensure this value is greater than or equal to 0.");
    }

    let thumbnail = match (&input.thumbnail, base) {
        (None, Some(b)) => b.thumbnail.clone(),
        (t, _) => validation::optional_url(&mut errors, "thumbnail", t.as_deref()).unwrap_or_default(),
    };

    let status = match (&input.status, base) {
        (None, Some(b)) => b.status,
        (None, None) => ProductStatus::Active,
        (Some(raw), _) => raw.trim().parse().unwrap_or_else(|_| {
            errors.add("status", "Select a valid choice.");
            ProductStatus::Active
        }),
    };

    if let (Some(category_id), false) = (category_id, errors.contains("name")) {
        if let Some(existing) = db::get_product_by_name(conn, &name, &category_id)? {
            if base.map(|b| b.id) != Some(existing.id) {
                errors.add("name", "A product with this name already exists in this category.");
            }
        }
    }

    errors.into_result()?;
    let category_id = category_id.ok_or(ShopError::NotFound("Category"))?;

    let (id, slug) = match base {
        Some(b) => (b.id, b.slug.clone()),
        None => (Uuid::new_v4(), unique_product_slug(conn, &slugify(&name), None)?),
    };

    Ok(Product {
        id,
        created_by: base.map_or(owner, |b| b.created_by),
        category_id,
        brand_id,
        name,
        slug,
        description,
        price,
        sale_price,
        currency,
        stock,
        total_sold: base.map_or(0, |b| b.total_sold),
        thumbnail,
        is_featured: input.is_featured.or(base.map(|b| b.is_featured)).unwrap_or(false),
        status,
        rating_avg: base.map_or(0.0, |b| b.rating_avg),
        rating_count: base.map_or(0, |b| b.rating_count),
        created_at: base.map_or(at, |b| b.created_at),
        updated_at: at,
    })
}

fn stored_detail(conn: &Connection, id: &Uuid, viewer: Option<&Viewer>) -> Result<ProductDetail, ShopError> {
    let row = db::get_product_row(conn, id)?.ok_or(ShopError::NotFound("Product"))?;
    detail_for(conn, &row, viewer)
}

/// Any signed-in user may list a product; they become its owner.
pub fn create_product(conn: &Connection, user: &User, input: &ProductInput) -> Result<ProductDetail, ShopError> {
    let product = apply_input(conn, input, None, Some(user.id))?;
    db::insert_product(conn, &product).map_err(|e| {
        if e.is_unique_violation() {
            ShopError::Validation(FieldErrors::single(
                "name",
                "A product with this name already exists in this category.",
            ))
        } else {
            ShopError::Database(e)
        }
    })?;
    tracing::info!(product_id = %product.id, user_id = user.id, "Product created");
    stored_detail(conn, &product.id, None)
}

fn load_managed(conn: &Connection, viewer: &Viewer, key: &str) -> Result<Product, ShopError> {
    let row = resolve_product(conn, key)?.ok_or(ShopError::NotFound("Product"))?;
    if !viewer.can_manage(row.product.created_by) {
        return Err(ShopError::Forbidden(
            "Only the owner or staff can modify this product".into(),
        ));
    }
    Ok(row.product)
}

pub fn update_product(
    conn: &Connection,
    viewer: &Viewer,
    key: &str,
    input: &ProductInput,
) -> Result<ProductDetail, ShopError> {
    let existing = load_managed(conn, viewer, key)?;
    let product = apply_input(conn, input, Some(&existing), existing.created_by)?;
    db::update_product(conn, &product)?;
    tracing::info!(product_id = %product.id, "Product updated");
    stored_detail(conn, &product.id, Some(viewer))
}

pub fn delete_product(conn: &Connection, viewer: &Viewer, key: &str) -> Result<Uuid, ShopError> {
    let existing = load_managed(conn, viewer, key)?;
    db::delete_product(conn, &existing.id)?;
    tracing::info!(product_id = %existing.id, "Product deleted");
    Ok(existing.id)
}

// ═══════════════════════════════════════════════════════════
// Stock
// ═══════════════════════════════════════════════════════════

/// Take `qty` units out of stock and count them as sold.
pub fn reserve(conn: &Connection, product_id: &Uuid, qty: i64) -> Result<(), ShopError> {
    if qty < 1 {
        return Err(ShopError::InvalidQuantity);
    }
    let product = db::get_product(conn, product_id)?.ok_or(ShopError::NotFound("Product"))?;
    if !db::reserve_stock(conn, product_id, qty)? {
        return Err(ShopError::InsufficientStock(product.name));
    }
    Ok(())
}

pub fn restock(conn: &Connection, product_id: &Uuid, qty: i64) -> Result<(), ShopError> {
    if qty < 1 {
        return Err(ShopError::InvalidQuantity);
    }
    match db::restock(conn, product_id, qty) {
        Err(DatabaseError::NotFound { .. }) => Err(ShopError::NotFound("Product")),
        other => Ok(other?),
    }
}
