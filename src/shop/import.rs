//! Bulk import of scraped products from a JSON array.
//!
//! Each entry carries `name`, `price` (e.g. `"Rp.1.299.000"`), `image_url`
//! and `product_url`. Products land in the "Scraped Products" category,
//! owned by the `admin` user, with the brand inferred from the name.

use std::io::Read;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{slugify, unique_product_slug, ShopError};
use crate::db::{self, BrandFields, DatabaseError, NewUser};
use crate::models::{Money, Product, ProductStatus, User};

pub const IMPORT_CATEGORY: &str = "Scraped Products";
pub const UNKNOWN_BRAND: &str = "Unknown Brand";
const IMPORT_OWNER: &str = "admin";
const IMPORT_STOCK: i64 = 10;
const KNOWN_BRANDS: &[&str] = &[
    "Nike",
    "Adidas",
    "New Balance",
    "Puma",
    "Converse",
    "Vans",
    "Crocs",
    "Asics",
];

#[derive(Debug, Deserialize)]
struct ImportedProduct {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    product_url: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Parse a scraped price such as `"Rp.1.299.000"` into whole currency
/// units. Dots are thousands separators. Unparsable input is zero.
pub fn parse_scraped_price(raw: &serde_json::Value) -> Money {
    let text = match raw {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return Money::ZERO,
    };
    let cleaned: String = text.replace("Rp.", "").replace("Rp", "").replace('.', "");
    Money::parse(cleaned.trim()).unwrap_or(Money::ZERO)
}

/// First known brand contained in the product name.
pub fn infer_brand(name: &str) -> &'static str {
    KNOWN_BRANDS
        .iter()
        .copied()
        .find(|brand| name.contains(brand))
        .unwrap_or(UNKNOWN_BRAND)
}

fn import_owner(conn: &Connection) -> Result<User, DatabaseError> {
    if let Some(user) = db::get_user_by_username(conn, IMPORT_OWNER)? {
        return Ok(user);
    }
    // "!" never verifies, so the account cannot log in until a password is set.
    db::insert_user(
        conn,
        &NewUser {
            username: IMPORT_OWNER,
            email: "",
            password_hash: "!",
            is_staff: true,
            is_superuser: true,
        },
    )
}

fn brand_id_for(conn: &Connection, name: &str) -> Result<Uuid, DatabaseError> {
    if let Some(brand) = db::get_brand_by_name(conn, name)? {
        return Ok(brand.id);
    }
    let slug = slugify(name);
    db::insert_brand(
        conn,
        &BrandFields {
            name,
            slug: &slug,
            description: "",
            logo_url: "",
        },
    )
}

fn import_category(conn: &Connection) -> Result<Uuid, DatabaseError> {
    let slug = slugify(IMPORT_CATEGORY);
    if let Some(category) = db::get_category_by_slug(conn, &slug)? {
        return Ok(category.id);
    }
    db::insert_category(conn, IMPORT_CATEGORY, &slug, None)
}

/// Upsert every entry by name within the import category. Entries without
/// a name or with a zero price are skipped. Runs in one transaction.
pub fn import_products_json<R: Read>(conn: &Connection, reader: R) -> Result<ProductImportSummary, ShopError> {
    let entries: Vec<ImportedProduct> =
        serde_json::from_reader(reader).map_err(|e| ShopError::Import(format!("invalid JSON: {e}")))?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let owner = import_owner(&tx)?;
    let category_id = import_category(&tx)?;
    let mut summary = ProductImportSummary::default();

    for entry in entries {
        let name = entry.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() || name == "Unknown Product" {
            summary.skipped += 1;
            continue;
        }
        let price = entry.price.as_ref().map(parse_scraped_price).unwrap_or(Money::ZERO);
        if price == Money::ZERO {
            tracing::debug!(name, "Skipping product without price");
            summary.skipped += 1;
            continue;
        }

        let brand_id = brand_id_for(&tx, infer_brand(name))?;
        let thumbnail = entry.image_url.unwrap_or_default();
        let description = format!(
            "Original Product URL: {}",
            entry.product_url.unwrap_or_default()
        );
        let at = db::now();

        match db::get_product_by_name(&tx, name, &category_id)? {
            Some(mut existing) => {
                existing.price = price;
                existing.thumbnail = thumbnail;
                existing.description = description;
                existing.brand_id = Some(brand_id);
                existing.stock = IMPORT_STOCK;
                existing.is_featured = false;
                existing.status = ProductStatus::Active;
                existing.currency = "IDR".into();
                db::update_product(&tx, &existing)?;
                summary.updated += 1;
            }
            None => {
                let slug = unique_product_slug(&tx, &slugify(name), None)?;
                db::insert_product(
                    &tx,
                    &Product {
                        id: Uuid::new_v4(),
                        created_by: Some(owner.id),
                        category_id,
                        brand_id: Some(brand_id),
                        name: name.to_string(),
                        slug,
                        description,
                        price,
                        sale_price: None,
                        currency: "IDR".into(),
                        stock: IMPORT_STOCK,
                        total_sold: 0,
                        thumbnail,
                        is_featured: false,
                        status: ProductStatus::Active,
                        rating_avg: 0.0,
                        rating_count: 0,
                        created_at: at,
                        updated_at: at,
                    },
                )?;
                summary.created += 1;
            }
        }
    }

    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "Product import complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use serde_json::json;

    #[test]
    fn scraped_prices_parse() {
        assert_eq!(parse_scraped_price(&json!("Rp.1.299.000")), Money(129_900_000));
        assert_eq!(parse_scraped_price(&json!("Rp 450.000")), Money(45_000_000));
        assert_eq!(parse_scraped_price(&json!(799000)), Money(79_900_000));
        assert_eq!(parse_scraped_price(&json!("gratis")), Money::ZERO);
        assert_eq!(parse_scraped_price(&json!(null)), Money::ZERO);
    }

    #[test]
    fn brand_inference() {
        assert_eq!(infer_brand("Nike Air Force 1"), "Nike");
        assert_eq!(infer_brand("New Balance 550"), "New Balance");
        assert_eq!(infer_brand("Generic Slides"), UNKNOWN_BRAND);
    }

    #[test]
    fn import_creates_then_updates() {
        let conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let payload = json!([
            {"name": "Nike Pegasus 40", "price": "Rp.1.899.000", "image_url": "https://img.example.com/p.jpg", "product_url": "https://shop.example.com/p"},
            {"name": "Puma Suede", "price": "Rp.0", "image_url": "", "product_url": ""},
            {"name": "", "price": "Rp.100.000"},
            {"name": "Mystery Sandal", "price": "Rp.150.000"}
        ]);
        std::fs::write(&path, payload.to_string()).unwrap();

        let summary = import_products_json(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(summary, ProductImportSummary { created: 2, updated: 0, skipped: 2 });

        let category = db::get_category_by_slug(&conn, "scraped-products").unwrap().unwrap();
        let pegasus = db::get_product_by_name(&conn, "Nike Pegasus 40", &category.id).unwrap().unwrap();
        assert_eq!(pegasus.stock, 10);
        assert_eq!(pegasus.price, Money(189_900_000));
        let nike = db::get_brand_by_name(&conn, "Nike").unwrap().unwrap();
        assert_eq!(pegasus.brand_id, Some(nike.id));
        assert!(db::get_brand_by_name(&conn, UNKNOWN_BRAND).unwrap().is_some());
        let owner = db::get_user_by_username(&conn, "admin").unwrap().unwrap();
        assert_eq!(pegasus.created_by, Some(owner.id));

        let again = import_products_json(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(again, ProductImportSummary { created: 0, updated: 2, skipped: 2 });
    }

    #[test]
    fn invalid_json_is_reported() {
        let conn = open_memory_database().unwrap();
        let err = import_products_json(&conn, "not json".as_bytes()).unwrap_err();
        assert!(matches!(err, ShopError::Import(_)));
    }
}
