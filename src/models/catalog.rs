use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProductStatus;
use super::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    /// Ancestor names joined with `" / "`, root first.
    pub full_path: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub logo_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub created_by: Option<i64>,
    pub category_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub currency: String,
    pub stock: i64,
    pub total_sold: i64,
    pub thumbnail: String,
    pub is_featured: bool,
    pub status: ProductStatus,
    pub rating_avg: f64,
    pub rating_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Product {
    pub fn final_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn discount_percent(&self) -> i64 {
        match self.sale_price {
            Some(sale) if self.price.0 > 0 => {
                let pct = 100.0 * (self.price.0 - sale.0) as f64 / self.price.0 as f64;
                pct.round() as i64
            }
            _ => 0,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0 && self.status == ProductStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub rating: i64,
    pub title: String,
    pub content: String,
    pub is_verified_purchase: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
