use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RoleVisibility, SearchScope};
use super::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPreference {
    pub id: Uuid,
    pub user_id: i64,
    pub label: String,
    pub description: String,
    pub default_scope: SearchScope,
    pub default_news_category: Option<Uuid>,
    pub default_product_category: Option<Uuid>,
    pub default_brand: Option<Uuid>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub only_discount: bool,
    pub is_public: bool,
    pub role_visibility: RoleVisibility,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLog {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub session_key: String,
    pub keyword: String,
    pub scope: SearchScope,
    pub preference_id: Option<Uuid>,
    pub result_count: i64,
    pub created_at: NaiveDateTime,
}

/// Entry of the per-session recent search list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentSearch {
    pub query: String,
    pub scope: SearchScope,
    pub news_count: i64,
    pub product_count: i64,
    pub timestamp: NaiveDateTime,
}
