use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, like_pattern, opt_uuid_col, uuid_col};
use crate::db::{now, DatabaseError};
use crate::models::*;

/// Guard against malformed parent chains when walking up the tree.
const MAX_CATEGORY_DEPTH: i64 = 32;

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        parent_id: opt_uuid_col(row, 3)?,
        full_path: String::new(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn insert_category(
    conn: &Connection,
    name: &str,
    slug: &str,
    parent_id: Option<&Uuid>,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    let at = now();
    conn.execute(
        "INSERT INTO categories (id, name, slug, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id.to_string(), name, slug, parent_id.map(|p| p.to_string()), at],
    )?;
    Ok(id)
}

pub fn update_category(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    slug: &str,
    parent_id: Option<&Uuid>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE categories SET name = ?1, slug = ?2, parent_id = ?3, updated_at = ?4 WHERE id = ?5",
        params![name, slug, parent_id.map(|p| p.to_string()), now(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Category", id));
    }
    Ok(())
}

/// Delete a category. Fails with a foreign key violation while products
/// still reference it (or any of its descendants).
pub fn delete_category(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM categories WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn get_category(conn: &Connection, id: &Uuid) -> Result<Option<Category>, DatabaseError> {
    let category = conn
        .query_row(
            "SELECT id, name, slug, parent_id, created_at, updated_at FROM categories WHERE id = ?1",
            params![id.to_string()],
            category_from_row,
        )
        .optional()?;
    match category {
        Some(mut c) => {
            c.full_path = category_full_path(conn, &c.id)?;
            Ok(Some(c))
        }
        None => Ok(None),
    }
}

/// First category with this slug, root categories first.
pub fn get_category_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<Category>, DatabaseError> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM categories WHERE slug = ?1
             ORDER BY parent_id IS NOT NULL, created_at LIMIT 1",
            params![slug],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(raw) => {
            let id = Uuid::parse_str(&raw).map_err(|_| DatabaseError::not_found("Category", &raw))?;
            get_category(conn, &id)
        }
        None => Ok(None),
    }
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, parent_id, created_at, updated_at FROM categories ORDER BY name",
    )?;
    let rows = stmt.query_map([], category_from_row)?;
    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    for category in categories.iter_mut() {
        category.full_path = category_full_path(conn, &category.id)?;
    }
    Ok(categories)
}

/// Ancestor names joined with `" / "`, root first.
pub fn category_full_path(conn: &Connection, id: &Uuid) -> Result<String, DatabaseError> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE chain(id, name, parent_id, depth) AS (
             SELECT id, name, parent_id, 0 FROM categories WHERE id = ?1
             UNION ALL
             SELECT c.id, c.name, c.parent_id, chain.depth + 1
             FROM categories c JOIN chain ON c.id = chain.parent_id
             WHERE chain.depth < ?2
         )
         SELECT name FROM chain ORDER BY depth DESC",
    )?;
    let names = stmt
        .query_map(params![id.to_string(), MAX_CATEGORY_DEPTH], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join(" / "))
}

/// True when `candidate` is `id` itself or one of its descendants.
pub fn category_is_descendant(
    conn: &Connection,
    id: &Uuid,
    candidate: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "WITH RECURSIVE chain(id, parent_id, depth) AS (
             SELECT id, parent_id, 0 FROM categories WHERE id = ?1
             UNION ALL
             SELECT c.id, c.parent_id, chain.depth + 1
             FROM categories c JOIN chain ON c.id = chain.parent_id
             WHERE chain.depth < ?3
         )
         SELECT COUNT(*) FROM chain WHERE id = ?2",
        params![candidate.to_string(), id.to_string(), MAX_CATEGORY_DEPTH],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_products_in_category(conn: &Connection, id: &Uuid) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM products WHERE category_id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?)
}

// ═══════════════════════════════════════════════════════════
// Brands
// ═══════════════════════════════════════════════════════════

const BRAND_COLUMNS: &str = "id, name, slug, description, logo_url, created_at, updated_at";

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        logo_url: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub struct BrandFields<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
    pub logo_url: &'a str,
}

pub fn insert_brand(conn: &Connection, fields: &BrandFields<'_>) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO brands (id, name, slug, description, logo_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id.to_string(),
            fields.name,
            fields.slug,
            fields.description,
            fields.logo_url,
            now()
        ],
    )?;
    Ok(id)
}

pub fn update_brand(
    conn: &Connection,
    id: &Uuid,
    fields: &BrandFields<'_>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE brands SET name = ?1, slug = ?2, description = ?3, logo_url = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            fields.name,
            fields.slug,
            fields.description,
            fields.logo_url,
            now(),
            id.to_string()
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Brand", id));
    }
    Ok(())
}

/// Delete a brand; products keep existing with a null brand.
pub fn delete_brand(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM brands WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn get_brand(conn: &Connection, id: &Uuid) -> Result<Option<Brand>, DatabaseError> {
    let sql = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id.to_string()], brand_from_row).optional()?)
}

pub fn get_brand_by_name(conn: &Connection, name: &str) -> Result<Option<Brand>, DatabaseError> {
    let sql = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE name = ?1");
    Ok(conn.query_row(&sql, params![name], brand_from_row).optional()?)
}

pub fn list_brands(conn: &Connection) -> Result<Vec<Brand>, DatabaseError> {
    let sql = format!("SELECT {BRAND_COLUMNS} FROM brands ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], brand_from_row)?;
    let mut brands = Vec::new();
    for row in rows {
        brands.push(row?);
    }
    Ok(brands)
}

// ═══════════════════════════════════════════════════════════
// Products
// ═══════════════════════════════════════════════════════════

const PRODUCT_COLUMNS: &str = "p.id, p.created_by, p.category_id, p.brand_id, p.name, p.slug,
    p.description, p.price, p.sale_price, p.currency, p.stock, p.total_sold, p.thumbnail,
    p.is_featured, p.status, p.rating_avg, p.rating_count, p.created_at, p.updated_at";

/// Product with the display names of its category and brand.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub product: Product,
    pub category_name: String,
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// Featured first, then newest.
    #[default]
    Featured,
    Newest,
    PriceAsc,
    PriceDesc,
}

impl ProductSort {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price_asc") => Self::PriceAsc,
            Some("price_desc") => Self::PriceDesc,
            Some("newest") => Self::Newest,
            _ => Self::Featured,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Featured => "p.is_featured DESC, p.created_at DESC, p.rowid DESC",
            Self::Newest => "p.created_at DESC, p.rowid DESC",
            Self::PriceAsc => "COALESCE(p.sale_price, p.price) ASC, p.created_at DESC",
            Self::PriceDesc => "COALESCE(p.sale_price, p.price) DESC, p.created_at DESC",
        }
    }
}

#[derive(Debug, Default)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub category_slug: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub query: Option<String>,
    /// Also match the query against category and brand names.
    pub query_labels: bool,
    /// Bounds on the final price.
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub only_discount: bool,
    pub featured_only: bool,
    pub sort: ProductSort,
    /// Negative for no limit.
    pub limit: i64,
    pub offset: i64,
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: uuid_col(row, 0)?,
        created_by: row.get(1)?,
        category_id: uuid_col(row, 2)?,
        brand_id: opt_uuid_col(row, 3)?,
        name: row.get(4)?,
        slug: row.get(5)?,
        description: row.get(6)?,
        price: row.get(7)?,
        sale_price: row.get(8)?,
        currency: row.get(9)?,
        stock: row.get(10)?,
        total_sold: row.get(11)?,
        thumbnail: row.get(12)?,
        is_featured: row.get(13)?,
        status: enum_col(row, 14)?,
        rating_avg: row.get(15)?,
        rating_count: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

fn product_row_from_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        product: product_from_row(row)?,
        category_name: row.get(19)?,
        brand_name: row.get(20)?,
    })
}

pub fn insert_product(conn: &Connection, p: &Product) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO products (id, created_by, category_id, brand_id, name, slug, description,
         price, sale_price, currency, stock, total_sold, thumbnail, is_featured, status,
         rating_avg, rating_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            p.id.to_string(),
            p.created_by,
            p.category_id.to_string(),
            p.brand_id.map(|b| b.to_string()),
            p.name,
            p.slug,
            p.description,
            p.price,
            p.sale_price,
            p.currency,
            p.stock,
            p.total_sold,
            p.thumbnail,
            p.is_featured,
            p.status.as_str(),
            p.rating_avg,
            p.rating_count,
            p.created_at,
            p.updated_at,
        ],
    )?;
    Ok(())
}

/// Update the editable columns. Aggregates and sales counters are left alone.
pub fn update_product(conn: &Connection, p: &Product) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE products SET category_id = ?1, brand_id = ?2, name = ?3, slug = ?4,
         description = ?5, price = ?6, sale_price = ?7, currency = ?8, stock = ?9,
         thumbnail = ?10, is_featured = ?11, status = ?12, updated_at = ?13
         WHERE id = ?14",
        params![
            p.category_id.to_string(),
            p.brand_id.map(|b| b.to_string()),
            p.name,
            p.slug,
            p.description,
            p.price,
            p.sale_price,
            p.currency,
            p.stock,
            p.thumbnail,
            p.is_featured,
            p.status.as_str(),
            now(),
            p.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Product", p.id));
    }
    Ok(())
}

pub fn delete_product(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM products WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn get_product(conn: &Connection, id: &Uuid) -> Result<Option<Product>, DatabaseError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1");
    Ok(conn.query_row(&sql, params![id.to_string()], product_from_row).optional()?)
}

pub fn get_product_row(conn: &Connection, id: &Uuid) -> Result<Option<ProductRow>, DatabaseError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS}, c.name, b.name
         FROM products p
         JOIN categories c ON c.id = p.category_id
         LEFT JOIN brands b ON b.id = p.brand_id
         WHERE p.id = ?1"
    );
    Ok(conn.query_row(&sql, params![id.to_string()], product_row_from_row).optional()?)
}

pub fn get_product_row_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<ProductRow>, DatabaseError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS}, c.name, b.name
         FROM products p
         JOIN categories c ON c.id = p.category_id
         LEFT JOIN brands b ON b.id = p.brand_id
         WHERE p.slug = ?1"
    );
    Ok(conn.query_row(&sql, params![slug], product_row_from_row).optional()?)
}

pub fn get_product_by_name(
    conn: &Connection,
    name: &str,
    category_id: &Uuid,
) -> Result<Option<Product>, DatabaseError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.name = ?1 AND p.category_id = ?2");
    Ok(conn
        .query_row(&sql, params![name, category_id.to_string()], product_from_row)
        .optional()?)
}

/// True when another product already uses `slug`.
pub fn product_slug_taken(
    conn: &Connection,
    slug: &str,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE slug = ?1 AND (?2 IS NULL OR id != ?2)",
        params![slug, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// WHERE clause (with leading `WHERE`) and bound values for a filter.
fn product_conditions(filter: &ProductFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1;

    if let Some(status) = &filter.status {
        sql.push_str(&format!(" AND p.status = ?{param_idx}"));
        params_vec.push(Box::new(status.as_str()));
        param_idx += 1;
    }

    if let Some(slug) = &filter.category_slug {
        sql.push_str(&format!(" AND c.slug = ?{param_idx}"));
        params_vec.push(Box::new(slug.clone()));
        param_idx += 1;
    }

    if let Some(category_id) = &filter.category_id {
        sql.push_str(&format!(" AND p.category_id = ?{param_idx}"));
        params_vec.push(Box::new(category_id.to_string()));
        param_idx += 1;
    }

    if let Some(brand_id) = &filter.brand_id {
        sql.push_str(&format!(" AND p.brand_id = ?{param_idx}"));
        params_vec.push(Box::new(brand_id.to_string()));
        param_idx += 1;
    }

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let labels = if filter.query_labels {
            format!(
                " OR LOWER(c.name) LIKE ?{p} ESCAPE '\\' OR LOWER(b.name) LIKE ?{p} ESCAPE '\\'",
                p = param_idx
            )
        } else {
            String::new()
        };
        sql.push_str(&format!(
            " AND (LOWER(p.name) LIKE ?{p} ESCAPE '\\' OR LOWER(p.description) LIKE ?{p} ESCAPE '\\'{labels})",
            p = param_idx
        ));
        params_vec.push(Box::new(like_pattern(query)));
        param_idx += 1;
    }

    if let Some(min) = filter.min_price {
        sql.push_str(&format!(" AND COALESCE(p.sale_price, p.price) >= ?{param_idx}"));
        params_vec.push(Box::new(min));
        param_idx += 1;
    }

    if let Some(max) = filter.max_price {
        sql.push_str(&format!(" AND COALESCE(p.sale_price, p.price) <= ?{param_idx}"));
        params_vec.push(Box::new(max));
    }

    if filter.only_discount {
        sql.push_str(" AND p.sale_price IS NOT NULL");
    }

    if filter.featured_only {
        sql.push_str(" AND p.is_featured = 1");
    }

    (sql, params_vec)
}

const PRODUCT_FROM: &str = " FROM products p
    JOIN categories c ON c.id = p.category_id
    LEFT JOIN brands b ON b.id = p.brand_id";

/// Number of products matching a filter (limit and offset ignored).
pub fn count_products(conn: &Connection, filter: &ProductFilter) -> Result<i64, DatabaseError> {
    let (conditions, params_vec) = product_conditions(filter);
    let sql = format!("SELECT COUNT(*){PRODUCT_FROM}{conditions}");
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    Ok(conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?)
}

/// Filtered product listing. A negative `limit` returns every match.
pub fn list_products(conn: &Connection, filter: &ProductFilter) -> Result<Vec<ProductRow>, DatabaseError> {
    let (conditions, mut params_vec) = product_conditions(filter);
    let next_idx = params_vec.len() + 1;
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS}, c.name, b.name{PRODUCT_FROM}{conditions}
         ORDER BY {} LIMIT ?{} OFFSET ?{}",
        filter.sort.order_by(),
        next_idx,
        next_idx + 1
    );
    params_vec.push(Box::new(filter.limit));
    params_vec.push(Box::new(filter.offset));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), product_row_from_row)?;

    let mut products = Vec::new();
    for row in rows {
        products.push(row?);
    }
    Ok(products)
}

/// Decrement stock and count the sale, only when enough stock remains.
/// Returns false (and changes nothing) otherwise.
pub fn reserve_stock(conn: &Connection, id: &Uuid, qty: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE products SET stock = stock - ?1, total_sold = total_sold + ?1, updated_at = ?2
         WHERE id = ?3 AND stock >= ?1",
        params![qty, now(), id.to_string()],
    )?;
    Ok(changed == 1)
}

pub fn restock(conn: &Connection, id: &Uuid, qty: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE products SET stock = stock + ?1, updated_at = ?2 WHERE id = ?3",
        params![qty, now(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Product", id));
    }
    Ok(())
}

// ── Images ──────────────────────────────────────────────────

pub fn insert_product_image(
    conn: &Connection,
    product_id: &Uuid,
    url: &str,
    alt_text: &str,
    is_primary: bool,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO product_images (id, product_id, url, alt_text, is_primary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id.to_string(), product_id.to_string(), url, alt_text, is_primary, now()],
    )?;
    Ok(id)
}

pub fn list_product_images(
    conn: &Connection,
    product_id: &Uuid,
) -> Result<Vec<ProductImage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, product_id, url, alt_text, is_primary, created_at
         FROM product_images WHERE product_id = ?1
         ORDER BY is_primary DESC, created_at ASC",
    )?;
    let rows = stmt.query_map(params![product_id.to_string()], |row| {
        Ok(ProductImage {
            id: uuid_col(row, 0)?,
            product_id: uuid_col(row, 1)?,
            url: row.get(2)?,
            alt_text: row.get(3)?,
            is_primary: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    let mut images = Vec::new();
    for row in rows {
        images.push(row?);
    }
    Ok(images)
}

// ═══════════════════════════════════════════════════════════
// Reviews
// ═══════════════════════════════════════════════════════════

const REVIEW_SELECT: &str = "SELECT r.id, r.product_id, r.user_id, u.username, r.rating, r.title,
    r.content, r.is_verified_purchase, r.created_at, r.updated_at
    FROM reviews r JOIN users u ON u.id = r.user_id";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: uuid_col(row, 0)?,
        product_id: uuid_col(row, 1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        rating: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        is_verified_purchase: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub struct NewReview<'a> {
    pub product_id: &'a Uuid,
    pub user_id: i64,
    pub rating: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub is_verified_purchase: bool,
}

pub fn insert_review(conn: &Connection, new: &NewReview<'_>) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO reviews (id, product_id, user_id, rating, title, content,
         is_verified_purchase, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            id.to_string(),
            new.product_id.to_string(),
            new.user_id,
            new.rating,
            new.title,
            new.content,
            new.is_verified_purchase,
            now(),
        ],
    )?;
    Ok(id)
}

pub fn get_review(conn: &Connection, id: &Uuid) -> Result<Option<Review>, DatabaseError> {
    let sql = format!("{REVIEW_SELECT} WHERE r.id = ?1");
    Ok(conn.query_row(&sql, params![id.to_string()], review_from_row).optional()?)
}

pub fn delete_review(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM reviews WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn review_exists(conn: &Connection, product_id: &Uuid, user_id: i64) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE product_id = ?1 AND user_id = ?2",
        params![product_id.to_string(), user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Reviews of a product, newest first.
pub fn list_reviews(
    conn: &Connection,
    product_id: &Uuid,
    limit: Option<i64>,
) -> Result<Vec<Review>, DatabaseError> {
    let sql = format!(
        "{REVIEW_SELECT} WHERE r.product_id = ?1 ORDER BY r.created_at DESC, r.rowid DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![product_id.to_string(), limit.unwrap_or(-1)], review_from_row)?;
    let mut reviews = Vec::new();
    for row in rows {
        reviews.push(row?);
    }
    Ok(reviews)
}

/// Recompute `rating_avg`/`rating_count` from the reviews table.
pub fn recompute_rating(conn: &Connection, product_id: &Uuid) -> Result<(f64, i64), DatabaseError> {
    let (avg, count): (Option<f64>, i64) = conn.query_row(
        "SELECT AVG(rating), COUNT(*) FROM reviews WHERE product_id = ?1",
        params![product_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let avg = avg.unwrap_or(0.0);
    conn.execute(
        "UPDATE products SET rating_avg = ?1, rating_count = ?2 WHERE id = ?3",
        params![avg, count, product_id.to_string()],
    )?;
    Ok((avg, count))
}
