use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, uuid_col};
use crate::db::{now, DatabaseError};
use crate::models::*;

// ═══════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════

const PREFERENCE_COLUMNS: &str = "id, user_id, label, description, default_scope,
    default_news_category_id, default_product_category_id, default_brand_id, min_price,
    max_price, only_discount, is_public, role_visibility, created_at, updated_at";

fn preference_from_row(row: &Row<'_>) -> rusqlite::Result<SearchPreference> {
    Ok(SearchPreference {
        id: uuid_col(row, 0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        description: row.get(3)?,
        default_scope: enum_col(row, 4)?,
        default_news_category: opt_uuid_col(row, 5)?,
        default_product_category: opt_uuid_col(row, 6)?,
        default_brand: opt_uuid_col(row, 7)?,
        min_price: row.get(8)?,
        max_price: row.get(9)?,
        only_discount: row.get(10)?,
        is_public: row.get(11)?,
        role_visibility: enum_col(row, 12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Writable preset fields.
#[derive(Debug, Clone)]
pub struct PreferenceFields {
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
}

pub fn insert_preference(
    conn: &Connection,
    user_id: i64,
    f: &PreferenceFields,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO search_preferences (id, user_id, label, description, default_scope,
         default_news_category_id, default_product_category_id, default_brand_id, min_price,
         max_price, only_discount, is_public, role_visibility, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            id.to_string(),
            user_id,
            f.label,
            f.description,
            f.default_scope.as_str(),
            f.default_news_category.map(|u| u.to_string()),
            f.default_product_category.map(|u| u.to_string()),
            f.default_brand.map(|u| u.to_string()),
            f.min_price,
            f.max_price,
            f.only_discount,
            f.is_public,
            f.role_visibility.as_str(),
            now(),
        ],
    )?;
    Ok(id)
}

pub fn update_preference(conn: &Connection, id: &Uuid, f: &PreferenceFields) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE search_preferences SET label = ?1, description = ?2, default_scope = ?3,
         default_news_category_id = ?4, default_product_category_id = ?5, default_brand_id = ?6,
         min_price = ?7, max_price = ?8, only_discount = ?9, is_public = ?10,
         role_visibility = ?11, updated_at = ?12 WHERE id = ?13",
        params![
            f.label,
            f.description,
            f.default_scope.as_str(),
            f.default_news_category.map(|u| u.to_string()),
            f.default_product_category.map(|u| u.to_string()),
            f.default_brand.map(|u| u.to_string()),
            f.min_price,
            f.max_price,
            f.only_discount,
            f.is_public,
            f.role_visibility.as_str(),
            now(),
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("SearchPreference", id));
    }
    Ok(())
}

pub fn delete_preference(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM search_preferences WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn get_preference(conn: &Connection, id: &Uuid) -> Result<Option<SearchPreference>, DatabaseError> {
    let sql = format!("SELECT {PREFERENCE_COLUMNS} FROM search_preferences WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id.to_string()], preference_from_row).optional()?)
}

pub fn preference_label_taken(
    conn: &Connection,
    user_id: i64,
    label: &str,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM search_preferences
         WHERE user_id = ?1 AND label = ?2 AND (?3 IS NULL OR id != ?3)",
        params![user_id, label, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Presets a viewer may use: public presets for everyone, the viewer's own
/// presets, and public staff presets for staff. Ordered by label.
pub fn list_visible_preferences(
    conn: &Connection,
    viewer_id: Option<i64>,
    viewer_is_staff: bool,
) -> Result<Vec<SearchPreference>, DatabaseError> {
    let sql = format!(
        "SELECT {PREFERENCE_COLUMNS} FROM search_preferences
         WHERE (is_public = 1 AND role_visibility = 'all')
            OR (?1 IS NOT NULL AND user_id = ?1)
            OR (?2 = 1 AND is_public = 1 AND role_visibility = 'staff')
         ORDER BY label, created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![viewer_id, viewer_is_staff], preference_from_row)?;
    let mut presets = Vec::new();
    for row in rows {
        presets.push(row?);
    }
    Ok(presets)
}

// ═══════════════════════════════════════════════════════════
// Logs & analytics
// ═══════════════════════════════════════════════════════════

pub struct NewSearchLog<'a> {
    pub user_id: Option<i64>,
    pub session_key: &'a str,
    pub keyword: &'a str,
    pub scope: SearchScope,
    pub preference_id: Option<&'a Uuid>,
    pub result_count: i64,
}

pub fn insert_search_log(conn: &Connection, log: &NewSearchLog<'_>) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO search_logs (id, user_id, session_key, keyword, scope, preference_id,
         result_count, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            log.user_id,
            log.session_key,
            log.keyword,
            log.scope.as_str(),
            log.preference_id.map(|p| p.to_string()),
            log.result_count,
            now(),
        ],
    )?;
    Ok(id)
}

pub fn list_search_logs(conn: &Connection, limit: i64) -> Result<Vec<SearchLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, session_key, keyword, scope, preference_id, result_count, created_at
         FROM search_logs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(SearchLog {
            id: uuid_col(row, 0)?,
            user_id: row.get(1)?,
            session_key: row.get(2)?,
            keyword: row.get(3)?,
            scope: enum_col(row, 4)?,
            preference_id: opt_uuid_col(row, 5)?,
            result_count: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;
    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

/// Most frequent keywords, `(keyword, total)`, highest first.
pub fn top_keywords(conn: &Connection, limit: i64) -> Result<Vec<(String, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT keyword, COUNT(*) AS total FROM search_logs
         GROUP BY keyword ORDER BY total DESC, keyword ASC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Log count per scope, highest first.
pub fn scope_breakdown(conn: &Connection) -> Result<Vec<(SearchScope, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT scope, COUNT(*) AS total FROM search_logs
         GROUP BY scope ORDER BY total DESC, scope ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok((enum_col(row, 0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures;

    fn preset(label: &str, is_public: bool, visibility: RoleVisibility) -> PreferenceFields {
        PreferenceFields {
            label: label.into(),
            description: String::new(),
            default_scope: SearchScope::All,
            default_news_category: None,
            default_product_category: None,
            default_brand: None,
            min_price: None,
            max_price: None,
            only_discount: false,
            is_public,
            role_visibility: visibility,
        }
    }

    #[test]
    fn visibility_rules() {
        let conn = open_memory_database().unwrap();
        let owner = fixtures::user(&conn, "owner", false);
        let other = fixtures::user(&conn, "other", false);
        let staff = fixtures::user(&conn, "staff", true);

        insert_preference(&conn, owner.id, &preset("Public", true, RoleVisibility::All)).unwrap();
        insert_preference(&conn, owner.id, &preset("Private", false, RoleVisibility::Private)).unwrap();
        insert_preference(&conn, owner.id, &preset("Staff", true, RoleVisibility::Staff)).unwrap();

        let labels = |presets: Vec<SearchPreference>| {
            presets.into_iter().map(|p| p.label).collect::<Vec<_>>()
        };

        assert_eq!(labels(list_visible_preferences(&conn, None, false).unwrap()), ["Public"]);
        assert_eq!(
            labels(list_visible_preferences(&conn, Some(other.id), false).unwrap()),
            ["Public"]
        );
        assert_eq!(
            labels(list_visible_preferences(&conn, Some(staff.id), true).unwrap()),
            ["Public", "Staff"]
        );
        assert_eq!(
            labels(list_visible_preferences(&conn, Some(owner.id), false).unwrap()),
            ["Private", "Public", "Staff"]
        );
    }

    #[test]
    fn label_unique_per_user() {
        let conn = open_memory_database().unwrap();
        let a = fixtures::user(&conn, "a", false);
        let b = fixtures::user(&conn, "b", false);
        insert_preference(&conn, a.id, &preset("Deals", true, RoleVisibility::All)).unwrap();
        insert_preference(&conn, b.id, &preset("Deals", true, RoleVisibility::All)).unwrap();
        assert!(preference_label_taken(&conn, a.id, "Deals", None).unwrap());
        let err = insert_preference(&conn, a.id, &preset("Deals", true, RoleVisibility::All)).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn analytics_counts_keywords_and_scopes() {
        let conn = open_memory_database().unwrap();
        for (keyword, scope) in [
            ("nike", SearchScope::Products),
            ("nike", SearchScope::All),
            ("derby", SearchScope::News),
        ] {
            insert_search_log(
                &conn,
                &NewSearchLog {
                    user_id: None,
                    session_key: "s",
                    keyword,
                    scope,
                    preference_id: None,
                    result_count: 1,
                },
            )
            .unwrap();
        }
        let top = top_keywords(&conn, 8).unwrap();
        assert_eq!(top[0], ("nike".to_string(), 2));
        assert_eq!(scope_breakdown(&conn).unwrap().len(), 3);
        assert_eq!(list_search_logs(&conn, 10).unwrap().len(), 3);
    }
}
