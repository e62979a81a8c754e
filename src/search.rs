//! Cross-content search over news and products, with saved presets,
//! per-session recent searches and keyword analytics.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::Viewer;
use crate::db::{self, DatabaseError, NewSearchLog, NewsFilter, NewsOrder, PreferenceFields, ProductFilter, ProductSort};
use crate::models::{
    Brand, Category, Money, NewsCategory, ProductStatus, RecentSearch, RoleVisibility, SearchPreference, SearchScope,
    User,
};
use crate::news::NewsCard;
use crate::shop::ProductCard;
use crate::validation::{self, lenient_bool, lenient_money, FieldErrors};

/// Per-list cap on search results.
pub const RESULT_LIMIT: i64 = 8;
pub const RECENT_LIMIT: usize = 6;
const QUERY_MAX: usize = 255;
const LABEL_MAX: usize = 100;
const TOP_KEYWORDS: i64 = 8;
const TRENDING_NEWS: i64 = 4;
const FEATURED_PRODUCTS: i64 = 6;
const UNCATEGORIZED: &str = "General";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for SearchError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

// ── Shared field checks ─────────────────────────────────────

fn scope_field(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Option<SearchScope> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.to_ascii_lowercase().parse() {
        Ok(scope) => Some(scope),
        Err(_) => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

/// Resolve an optional reference by UUID through `exists`.
fn reference_field(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    exists: impl FnOnce(&Uuid) -> Result<bool, DatabaseError>,
) -> Result<Option<Uuid>, DatabaseError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match Uuid::parse_str(raw) {
        Ok(id) if exists(&id)? => Ok(Some(id)),
        _ => {
            errors.add(field, INVALID_CHOICE);
            Ok(None)
        }
    }
}

fn price_bounds(errors: &mut FieldErrors, min: Option<Money>, max: Option<Money>) {
    if min.is_some_and(|m| m.is_negative()) {
        errors.add("min_price", "Ensure this value is greater than or equal to 0.");
    }
    if max.is_some_and(|m| m.is_negative()) {
        errors.add("max_price", "Ensure this value is greater than or equal to 0.");
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            errors.add("__all__", "Minimum price cannot be greater than maximum price.");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchCriteria {
    #[serde(alias = "q")]
    pub query: Option<String>,
    #[serde(alias = "scope")]
    pub search_in: Option<String>,
    pub news_category: Option<String>,
    pub product_category: Option<String>,
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub min_price: Option<Money>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub max_price: Option<Money>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub only_discount: Option<bool>,
    /// Preset UUID.
    pub preference: Option<String>,
}

/// Validated criteria, before and after preset defaults are applied.
#[derive(Debug, Default, Clone)]
struct Resolved {
    query: String,
    scope: Option<SearchScope>,
    news_category: Option<Uuid>,
    product_category: Option<Uuid>,
    brand: Option<Uuid>,
    min_price: Option<Money>,
    max_price: Option<Money>,
    only_discount: bool,
}

impl Resolved {
    /// Fill only what the request left empty.
    fn apply_preset(&mut self, preset: &SearchPreference) {
        self.scope = self.scope.or(Some(preset.default_scope));
        self.news_category = self.news_category.or(preset.default_news_category);
        self.product_category = self.product_category.or(preset.default_product_category);
        self.brand = self.brand.or(preset.default_brand);
        self.min_price = self.min_price.or(preset.min_price);
        self.max_price = self.max_price.or(preset.max_price);
        self.only_discount = self.only_discount || preset.only_discount;
    }
}

fn resolve_criteria(conn: &Connection, criteria: &SearchCriteria) -> Result<Resolved, SearchError> {
    let mut errors = FieldErrors::new();
    let query = validation::optional_text(&mut errors, "query", criteria.query.as_deref(), QUERY_MAX);
    let scope = scope_field(&mut errors, "search_in", criteria.search_in.as_deref());
    let news_category = reference_field(&mut errors, "news_category", criteria.news_category.as_deref(), |id| {
        Ok(db::get_news_category(conn, id)?.is_some())
    })?;
    let product_category =
        reference_field(&mut errors, "product_category", criteria.product_category.as_deref(), |id| {
            Ok(db::get_category(conn, id)?.is_some())
        })?;
    let brand = reference_field(&mut errors, "brand", criteria.brand.as_deref(), |id| {
        Ok(db::get_brand(conn, id)?.is_some())
    })?;
    price_bounds(&mut errors, criteria.min_price, criteria.max_price);
    errors.into_result()?;

    Ok(Resolved {
        query,
        scope,
        news_category,
        product_category,
        brand,
        min_price: criteria.min_price,
        max_price: criteria.max_price,
        only_discount: criteria.only_discount.unwrap_or(false),
    })
}

/// A preset the viewer may apply: staff-only presets need staff, and
/// private ones belong to their owner.
fn usable_preset(conn: &Connection, viewer: &Viewer, raw: &str) -> Result<SearchPreference, SearchError> {
    let id = Uuid::parse_str(raw.trim()).map_err(|_| SearchError::NotFound("Preset"))?;
    let preset = db::get_preference(conn, &id)?.ok_or(SearchError::NotFound("Preset"))?;
    if preset.role_visibility == RoleVisibility::Staff && !viewer.is_staff() {
        return Err(SearchError::Forbidden("This preset is for staff only".into()));
    }
    let private = !preset.is_public || preset.role_visibility == RoleVisibility::Private;
    if private && viewer.user_id() != Some(preset.user_id) {
        return Err(SearchError::Forbidden("You are not allowed to use this preset".into()));
    }
    Ok(preset)
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsHit {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub thumbnail: Option<String>,
    /// Staff only.
    pub views: Option<i64>,
    pub published_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductHit {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub thumbnail: String,
    pub price: Money,
    pub currency: String,
    pub discount: i64,
    /// Staff only.
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub query: String,
    pub scope: SearchScope,
    pub news_count: i64,
    pub product_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub summary: SearchSummary,
    pub news: Vec<NewsHit>,
    pub products: Vec<ProductHit>,
    pub recent: Vec<RecentSearch>,
    pub role: &'static str,
}

fn push_recent(mut recent: Vec<RecentSearch>, entry: RecentSearch) -> Vec<RecentSearch> {
    recent.retain(|r| !(r.query == entry.query && r.scope == entry.scope));
    recent.insert(0, entry);
    recent.truncate(RECENT_LIMIT);
    recent
}

/// Run a search, log it and push it onto the session's recent list.
pub fn search(conn: &Connection, viewer: &Viewer, criteria: &SearchCriteria) -> Result<SearchResults, SearchError> {
    let mut resolved = resolve_criteria(conn, criteria)?;
    let preset = match criteria.preference.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(usable_preset(conn, viewer, raw)?),
        None => None,
    };
    if let Some(preset) = &preset {
        resolved.apply_preset(preset);
    }
    let scope = resolved.scope.unwrap_or(SearchScope::All);
    let is_staff = viewer.is_staff();
    let query = Some(resolved.query.clone()).filter(|q| !q.is_empty());

    let news = if scope == SearchScope::Products {
        Vec::new()
    } else {
        let filter = NewsFilter {
            published_only: true,
            category_id: resolved.news_category,
            query: query.clone(),
            query_category: true,
            order: NewsOrder::Newest,
            limit: RESULT_LIMIT,
            ..NewsFilter::default()
        };
        db::list_news(conn, &filter)?
            .into_iter()
            .map(|n| NewsHit {
                id: n.id,
                title: n.title,
                category: n.category.map(|c| c.name).unwrap_or_else(|| UNCATEGORIZED.to_string()),
                thumbnail: n.thumbnail,
                views: is_staff.then_some(n.views),
                published_at: n.created_at,
            })
            .collect()
    };

    let products = if scope == SearchScope::News {
        Vec::new()
    } else {
        let filter = ProductFilter {
            status: Some(ProductStatus::Active),
            category_id: resolved.product_category,
            brand_id: resolved.brand,
            query,
            query_labels: true,
            min_price: resolved.min_price,
            max_price: resolved.max_price,
            only_discount: resolved.only_discount,
            sort: ProductSort::Newest,
            limit: RESULT_LIMIT,
            ..ProductFilter::default()
        };
        db::list_products(conn, &filter)?
            .into_iter()
            .map(|row| {
                let p = row.product;
                ProductHit {
                    price: p.final_price(),
                    discount: p.discount_percent(),
                    stock: is_staff.then_some(p.stock),
                    id: p.id,
                    name: p.name,
                    slug: p.slug,
                    thumbnail: p.thumbnail,
                    currency: p.currency,
                }
            })
            .collect()
    };

    let summary = SearchSummary {
        query: resolved.query.clone(),
        scope,
        news_count: news.len() as i64,
        product_count: products.len() as i64,
    };
    let recent = push_recent(
        viewer.recent_searches().to_vec(),
        RecentSearch {
            query: summary.query.clone(),
            scope,
            news_count: summary.news_count,
            product_count: summary.product_count,
            timestamp: db::now(),
        },
    );

    let tx = conn.unchecked_transaction()?;
    db::insert_search_log(
        &tx,
        &NewSearchLog {
            user_id: viewer.user_id(),
            session_key: viewer.session_id().unwrap_or_default(),
            keyword: &summary.query,
            scope,
            preference_id: preset.as_ref().map(|p| &p.id),
            result_count: summary.news_count + summary.product_count,
        },
    )?;
    if let Some(session_id) = viewer.session_id() {
        db::set_recent_searches(&tx, session_id, &recent)?;
    }
    tx.commit()?;

    tracing::debug!(scope = %scope, results = summary.news_count + summary.product_count, "Search");
    Ok(SearchResults {
        summary,
        news,
        products,
        recent,
        role: if is_staff { "staff" } else { "user" },
    })
}

/// The session's recent searches, newest first.
pub fn recent(viewer: &Viewer) -> Vec<RecentSearch> {
    viewer.recent_searches().to_vec()
}

// ═══════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════

/// Public presets for everyone, own presets when signed in and public
/// staff presets for staff.
pub fn available_presets(conn: &Connection, viewer: &Viewer) -> Result<Vec<SearchPreference>, SearchError> {
    Ok(db::list_visible_preferences(conn, viewer.user_id(), viewer.is_staff())?)
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PresetInput {
    pub label: Option<String>,
    pub description: Option<String>,
    pub default_scope: Option<String>,
    pub default_news_category: Option<String>,
    pub default_product_category: Option<String>,
    pub default_brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub min_price: Option<Money>,
    #[serde(default, deserialize_with = "lenient_money")]
    pub max_price: Option<Money>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub only_discount: Option<bool>,
    /// Defaults to public.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_public: Option<bool>,
    pub role_visibility: Option<String>,
}

fn validate_preset(
    conn: &Connection,
    user: &User,
    input: &PresetInput,
    current: Option<&Uuid>,
) -> Result<PreferenceFields, SearchError> {
    let mut errors = FieldErrors::new();
    let label = validation::required_text(&mut errors, "label", input.label.as_deref(), LABEL_MAX);
    if !errors.contains("label") && db::preference_label_taken(conn, user.id, &label, current)? {
        errors.add("label", "This label is already used by another of your presets.");
    }
    let default_scope = scope_field(&mut errors, "default_scope", input.default_scope.as_deref());
    let default_news_category = reference_field(
        &mut errors,
        "default_news_category",
        input.default_news_category.as_deref(),
        |id| Ok(db::get_news_category(conn, id)?.is_some()),
    )?;
    let default_product_category = reference_field(
        &mut errors,
        "default_product_category",
        input.default_product_category.as_deref(),
        |id| Ok(db::get_category(conn, id)?.is_some()),
    )?;
    let default_brand = reference_field(&mut errors, "default_brand", input.default_brand.as_deref(), |id| {
        Ok(db::get_brand(conn, id)?.is_some())
    })?;
    price_bounds(&mut errors, input.min_price, input.max_price);

    let role_visibility = match input.role_visibility.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => RoleVisibility::All,
        Some(raw) => raw.to_ascii_lowercase().parse().unwrap_or_else(|_| {
            errors.add("role_visibility", INVALID_CHOICE);
            RoleVisibility::All
        }),
    };
    if role_visibility == RoleVisibility::Staff && !user.is_staff_like() {
        errors.add("role_visibility", "You are not allowed to create staff-only presets.");
    }

    errors.into_result()?;
    Ok(PreferenceFields {
        label,
        description: input.description.as_deref().map(str::trim).unwrap_or_default().to_string(),
        default_scope: default_scope.unwrap_or(SearchScope::All),
        default_news_category,
        default_product_category,
        default_brand,
        min_price: input.min_price,
        max_price: input.max_price,
        only_discount: input.only_discount.unwrap_or(false),
        is_public: input.is_public.unwrap_or(true),
        role_visibility,
    })
}

/// Create a preset, or replace one of the user's own presets when `id`
/// is given.
pub fn save_preset(
    conn: &Connection,
    user: &User,
    id: Option<&Uuid>,
    input: &PresetInput,
) -> Result<SearchPreference, SearchError> {
    if let Some(id) = id {
        match db::get_preference(conn, id)? {
            Some(existing) if existing.user_id == user.id => {}
            _ => return Err(SearchError::NotFound("Preset")),
        }
    }
    let fields = validate_preset(conn, user, input, id)?;

    let saved = match id {
        Some(id) => db::update_preference(conn, id, &fields).map(|_| *id),
        None => db::insert_preference(conn, user.id, &fields),
    };
    let saved = saved.map_err(|e| {
        if e.is_unique_violation() {
            SearchError::Validation(FieldErrors::single(
                "label",
                "This label is already used by another of your presets.",
            ))
        } else {
            SearchError::Database(e)
        }
    })?;

    tracing::info!(preset_id = %saved, user_id = user.id, "Search preset saved");
    db::get_preference(conn, &saved)?.ok_or(SearchError::NotFound("Preset"))
}

/// Own presets only; anything else reads as missing.
pub fn delete_preset(conn: &Connection, user: &User, id: &Uuid) -> Result<(), SearchError> {
    match db::get_preference(conn, id)? {
        Some(preset) if preset.user_id == user.id => {
            db::delete_preference(conn, id)?;
            tracing::info!(preset_id = %id, "Search preset deleted");
            Ok(())
        }
        _ => Err(SearchError::NotFound("Preset")),
    }
}

// ═══════════════════════════════════════════════════════════
// Analytics & page data
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize, PartialEq)]
pub struct KeywordCount {
    pub keyword: String,
    pub total: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ScopeCount {
    pub scope: SearchScope,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct SearchAnalytics {
    pub top_queries: Vec<KeywordCount>,
    pub scope_breakdown: Vec<ScopeCount>,
}

pub fn analytics(conn: &Connection, user: &User) -> Result<SearchAnalytics, SearchError> {
    if !user.is_staff_like() {
        return Err(SearchError::Forbidden("Staff access required".into()));
    }
    Ok(SearchAnalytics {
        top_queries: db::top_keywords(conn, TOP_KEYWORDS)?
            .into_iter()
            .map(|(keyword, total)| KeywordCount { keyword, total })
            .collect(),
        scope_breakdown: db::scope_breakdown(conn)?
            .into_iter()
            .map(|(scope, total)| ScopeCount { scope, total })
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct ScopeOption {
    pub value: SearchScope,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub news_categories: Vec<NewsCategory>,
    pub product_categories: Vec<Category>,
    pub brands: Vec<Brand>,
    pub scopes: Vec<ScopeOption>,
}

pub fn filter_options(conn: &Connection) -> Result<FilterOptions, SearchError> {
    Ok(FilterOptions {
        news_categories: db::list_news_categories(conn)?,
        product_categories: db::list_categories(conn)?,
        brands: db::list_brands(conn)?,
        scopes: SearchScope::ALL
            .iter()
            .map(|scope| ScopeOption {
                value: *scope,
                label: scope.label(),
            })
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct SearchOverview {
    pub trending_news: Vec<NewsCard>,
    pub featured_products: Vec<ProductCard>,
    pub presets: Vec<SearchPreference>,
    pub recent: Vec<RecentSearch>,
}

/// Landing data for the search page.
pub fn overview(conn: &Connection, viewer: &Viewer) -> Result<SearchOverview, SearchError> {
    let trending = NewsFilter {
        published_only: true,
        order: NewsOrder::MostViewed,
        limit: TRENDING_NEWS,
        ..NewsFilter::default()
    };
    let featured = ProductFilter {
        status: Some(ProductStatus::Active),
        featured_only: true,
        sort: ProductSort::Newest,
        limit: FEATURED_PRODUCTS,
        ..ProductFilter::default()
    };
    Ok(SearchOverview {
        trending_news: db::list_news(conn, &trending)?.into_iter().map(NewsCard::from).collect(),
        featured_products: db::list_products(conn, &featured)?.iter().map(ProductCard::from).collect(),
        presets: available_presets(conn, viewer)?,
        recent: recent(viewer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::{open_memory_database, BrandFields};
    use crate::models::Session;

    struct Fixture {
        conn: Connection,
        staff: User,
        budi: User,
    }

    fn setup() -> Fixture {
        let conn = open_memory_database().unwrap();
        let staff = fixtures::user(&conn, "admin", true);
        let budi = fixtures::user(&conn, "budi", false);
        let football = db::get_or_create_news_category(&conn, "Football").unwrap();
        for (title, views) in [("Derby recap", 150), ("Transfer news", 20), ("Court report", 5)] {
            let id = db::insert_news(
                &conn,
                &db::NewsFields {
                    title,
                    summary: "",
                    content: "Match content",
                    category_id: Some(&football.id),
                    thumbnail: None,
                    source: "",
                    is_published: true,
                },
                Some(staff.id),
            )
            .unwrap();
            conn.execute("UPDATE news SET views = ?1 WHERE id = ?2", rusqlite::params![views, id.to_string()])
                .unwrap();
        }

        let shoes = fixtures::category(&conn, "Shoes");
        let nike = db::insert_brand(
            &conn,
            &BrandFields { name: "Nike", slug: "nike", description: "", logo_url: "" },
        )
        .unwrap();
        let mut runner = fixtures::product(&conn, shoes.id, "Derby Runner", 100_000, 4, None);
        runner.brand_id = Some(nike);
        runner.sale_price = Some(Money(80_000));
        runner.is_featured = true;
        db::update_product(&conn, &runner).unwrap();
        fixtures::product(&conn, shoes.id, "Court Classic", 300_000, 2, None);
        Fixture { conn, staff, budi }
    }

    fn viewer(conn: &Connection, user: Option<&User>) -> Viewer {
        let session = db::insert_session(conn, &Uuid::new_v4().to_string(), user.map(|u| u.id), db::now()).unwrap();
        Viewer { session: Some(session), user: user.cloned() }
    }

    fn reload(conn: &Connection, viewer: &Viewer) -> Viewer {
        let session: Session = db::get_session(conn, viewer.session_id().unwrap()).unwrap().unwrap();
        Viewer { session: Some(session), user: viewer.user.clone() }
    }

    fn query(q: &str) -> SearchCriteria {
        SearchCriteria { query: Some(q.into()), ..SearchCriteria::default() }
    }

    #[test]
    fn matches_news_and_products_and_hides_staff_fields() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        let results = search(&f.conn, &anon, &query("derby")).unwrap();
        assert_eq!(results.summary.news_count, 1);
        assert_eq!(results.summary.product_count, 1);
        assert_eq!(results.news[0].views, None);
        assert_eq!(results.products[0].stock, None);
        assert_eq!(results.products[0].price, Money(80_000));
        assert_eq!(results.role, "user");

        let staff = viewer(&f.conn, Some(&f.staff));
        let results = search(&f.conn, &staff, &query("derby")).unwrap();
        assert_eq!(results.news[0].views, Some(150));
        assert_eq!(results.products[0].stock, Some(4));
    }

    #[test]
    fn query_matches_category_and_brand_names() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        assert_eq!(search(&f.conn, &anon, &query("football")).unwrap().summary.news_count, 3);
        let results = search(&f.conn, &anon, &query("nike")).unwrap();
        assert_eq!(results.summary.product_count, 1);
    }

    #[test]
    fn scope_and_price_filters() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        let news_only = SearchCriteria { search_in: Some("news".into()), ..SearchCriteria::default() };
        let results = search(&f.conn, &anon, &news_only).unwrap();
        assert_eq!(results.summary.product_count, 0);
        assert_eq!(results.summary.news_count, 3);

        let cheap = SearchCriteria {
            search_in: Some("products".into()),
            max_price: Some(Money(90_000)),
            ..SearchCriteria::default()
        };
        let results = search(&f.conn, &anon, &cheap).unwrap();
        assert_eq!(results.summary.news_count, 0);
        assert_eq!(results.products.len(), 1);

        let discounted = SearchCriteria { only_discount: Some(true), ..SearchCriteria::default() };
        assert_eq!(search(&f.conn, &anon, &discounted).unwrap().products.len(), 1);
    }

    #[test]
    fn invalid_criteria_are_field_errors() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        let bad = SearchCriteria {
            query: Some("x".repeat(256)),
            search_in: Some("videos".into()),
            brand: Some(Uuid::new_v4().to_string()),
            min_price: Some(Money(500)),
            max_price: Some(Money(100)),
            ..SearchCriteria::default()
        };
        let SearchError::Validation(fields) = search(&f.conn, &anon, &bad).unwrap_err() else {
            panic!("expected validation");
        };
        for field in ["query", "search_in", "brand", "__all__"] {
            assert!(fields.contains(field), "missing {field}");
        }
    }

    #[test]
    fn recent_searches_dedupe_and_cap() {
        let f = setup();
        let mut v = viewer(&f.conn, None);
        for q in ["a", "b", "c", "d", "e", "f", "g", "a"] {
            search(&f.conn, &v, &query(q)).unwrap();
            v = reload(&f.conn, &v);
        }
        let recent = recent(&v);
        assert_eq!(recent.len(), RECENT_LIMIT);
        let queries: Vec<_> = recent.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, ["a", "g", "f", "e", "d", "c"]);
        assert_eq!(db::list_search_logs(&f.conn, 100).unwrap().len(), 8);
    }

    #[test]
    fn preset_access_and_fill() {
        let f = setup();
        let staff_preset = save_preset(
            &f.conn,
            &f.staff,
            None,
            &PresetInput {
                label: Some("Staff news".into()),
                default_scope: Some("news".into()),
                role_visibility: Some("staff".into()),
                ..PresetInput::default()
            },
        )
        .unwrap();
        let private = save_preset(
            &f.conn,
            &f.staff,
            None,
            &PresetInput {
                label: Some("Mine".into()),
                is_public: Some(false),
                ..PresetInput::default()
            },
        )
        .unwrap();

        let budi = viewer(&f.conn, Some(&f.budi));
        let use_preset = |v: &Viewer, p: &SearchPreference, scope: Option<&str>| {
            search(
                &f.conn,
                v,
                &SearchCriteria {
                    preference: Some(p.id.to_string()),
                    search_in: scope.map(str::to_string),
                    ..SearchCriteria::default()
                },
            )
        };
        assert!(matches!(use_preset(&budi, &staff_preset, None), Err(SearchError::Forbidden(_))));
        assert!(matches!(use_preset(&budi, &private, None), Err(SearchError::Forbidden(_))));

        let staff = viewer(&f.conn, Some(&f.staff));
        let filled = use_preset(&staff, &staff_preset, None).unwrap();
        assert_eq!(filled.summary.scope, SearchScope::News);
        let explicit = use_preset(&staff, &staff_preset, Some("products")).unwrap();
        assert_eq!(explicit.summary.scope, SearchScope::Products);

        let visible = available_presets(&f.conn, &budi).unwrap();
        assert!(visible.is_empty());
        let visible: Vec<_> = available_presets(&f.conn, &staff).unwrap().into_iter().map(|p| p.label).collect();
        assert_eq!(visible, ["Mine", "Staff news"]);
    }

    #[test]
    fn preset_validation_and_ownership() {
        let f = setup();
        let input = PresetInput { label: Some("Deals".into()), ..PresetInput::default() };
        let preset = save_preset(&f.conn, &f.budi, None, &input).unwrap();
        assert!(preset.is_public);

        let SearchError::Validation(fields) = save_preset(&f.conn, &f.budi, None, &input).unwrap_err() else {
            panic!("expected validation");
        };
        assert!(fields.contains("label"));

        let staff_only = PresetInput { role_visibility: Some("staff".into()), ..input.clone() };
        let SearchError::Validation(fields) = save_preset(&f.conn, &f.budi, Some(&preset.id), &staff_only).unwrap_err()
        else {
            panic!("expected validation");
        };
        assert!(fields.contains("role_visibility"));

        assert!(matches!(
            save_preset(&f.conn, &f.staff, Some(&preset.id), &input),
            Err(SearchError::NotFound(_))
        ));
        assert!(matches!(delete_preset(&f.conn, &f.staff, &preset.id), Err(SearchError::NotFound(_))));
        delete_preset(&f.conn, &f.budi, &preset.id).unwrap();
    }

    #[test]
    fn analytics_is_staff_only() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        for q in ["derby", "derby", "nike"] {
            search(&f.conn, &anon, &query(q)).unwrap();
        }
        assert!(matches!(analytics(&f.conn, &f.budi), Err(SearchError::Forbidden(_))));
        let stats = analytics(&f.conn, &f.staff).unwrap();
        assert_eq!(stats.top_queries[0], KeywordCount { keyword: "derby".into(), total: 2 });
        assert_eq!(stats.scope_breakdown, [ScopeCount { scope: SearchScope::All, total: 3 }]);
    }

    #[test]
    fn overview_lists_trending_and_featured() {
        let f = setup();
        let anon = viewer(&f.conn, None);
        let overview = overview(&f.conn, &anon).unwrap();
        assert_eq!(overview.trending_news[0].news.title, "Derby recap");
        assert!(overview.trending_news[0].is_hot);
        assert_eq!(overview.featured_products.len(), 1);
        assert!(overview.recent.is_empty());

        let options = filter_options(&f.conn).unwrap();
        assert_eq!(options.scopes.len(), 3);
        assert_eq!(options.brands.len(), 1);
    }
}
