use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, like_pattern, opt_uuid_col, uuid_col};
use crate::db::{now, DatabaseError};
use crate::models::*;

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

pub fn insert_news_category(conn: &Connection, name: &str) -> Result<NewsCategory, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO news_categories (id, name) VALUES (?1, ?2)",
        params![id.to_string(), name],
    )?;
    Ok(NewsCategory { id, name: name.to_string() })
}

pub fn get_news_category(conn: &Connection, id: &Uuid) -> Result<Option<NewsCategory>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM news_categories WHERE id = ?1",
            params![id.to_string()],
            |row| Ok(NewsCategory { id: uuid_col(row, 0)?, name: row.get(1)? }),
        )
        .optional()?)
}

pub fn get_news_category_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<NewsCategory>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM news_categories WHERE name = ?1",
            params![name],
            |row| Ok(NewsCategory { id: uuid_col(row, 0)?, name: row.get(1)? }),
        )
        .optional()?)
}

pub fn get_or_create_news_category(conn: &Connection, name: &str) -> Result<NewsCategory, DatabaseError> {
    if let Some(existing) = get_news_category_by_name(conn, name)? {
        return Ok(existing);
    }
    insert_news_category(conn, name)
}

pub fn list_news_categories(conn: &Connection) -> Result<Vec<NewsCategory>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM news_categories ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(NewsCategory { id: uuid_col(row, 0)?, name: row.get(1)? })
    })?;
    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

// ═══════════════════════════════════════════════════════════
// Articles
// ═══════════════════════════════════════════════════════════

const NEWS_SELECT: &str = "SELECT n.id, n.title, n.summary, n.content, n.category_id, c.name,
    n.thumbnail, n.views, n.author_id, u.username, n.source, n.is_published,
    n.created_at, n.updated_at
    FROM news n
    LEFT JOIN news_categories c ON c.id = n.category_id
    LEFT JOIN users u ON u.id = n.author_id";

fn news_from_row(row: &Row<'_>) -> rusqlite::Result<News> {
    let category_id = opt_uuid_col(row, 4)?;
    let category_name: Option<String> = row.get(5)?;
    Ok(News {
        id: uuid_col(row, 0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        content: row.get(3)?,
        category: category_id
            .zip(category_name)
            .map(|(id, name)| NewsCategory { id, name }),
        thumbnail: row.get(6)?,
        views: row.get(7)?,
        author_id: row.get(8)?,
        author_name: row.get(9)?,
        source: row.get(10)?,
        is_published: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Writable article fields.
pub struct NewsFields<'a> {
    pub title: &'a str,
    pub summary: &'a str,
    pub content: &'a str,
    pub category_id: Option<&'a Uuid>,
    pub thumbnail: Option<&'a str>,
    pub source: &'a str,
    pub is_published: bool,
}

pub fn insert_news(
    conn: &Connection,
    fields: &NewsFields<'_>,
    author_id: Option<i64>,
) -> Result<Uuid, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO news (id, title, summary, content, category_id, thumbnail, views, author_id,
         source, is_published, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?10)",
        params![
            id.to_string(),
            fields.title,
            fields.summary,
            fields.content,
            fields.category_id.map(|c| c.to_string()),
            fields.thumbnail,
            author_id,
            fields.source,
            fields.is_published,
            now(),
        ],
    )?;
    Ok(id)
}

/// Backdate an article, e.g. to the publication time of an imported story.
pub fn set_news_created_at(conn: &Connection, id: &Uuid, at: NaiveDateTime) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE news SET created_at = ?1, updated_at = ?1 WHERE id = ?2",
        params![at, id.to_string()],
    )?;
    Ok(())
}

pub fn update_news(conn: &Connection, id: &Uuid, fields: &NewsFields<'_>) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE news SET title = ?1, summary = ?2, content = ?3, category_id = ?4, thumbnail = ?5,
         source = ?6, is_published = ?7, updated_at = ?8 WHERE id = ?9",
        params![
            fields.title,
            fields.summary,
            fields.content,
            fields.category_id.map(|c| c.to_string()),
            fields.thumbnail,
            fields.source,
            fields.is_published,
            now(),
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("News", id));
    }
    Ok(())
}

pub fn delete_news(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM news WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn get_news(conn: &Connection, id: &Uuid) -> Result<Option<News>, DatabaseError> {
    let sql = format!("{NEWS_SELECT} WHERE n.id = ?1");
    Ok(conn.query_row(&sql, params![id.to_string()], news_from_row).optional()?)
}

pub fn news_title_taken(conn: &Connection, title: &str, exclude: Option<&Uuid>) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM news WHERE title = ?1 AND (?2 IS NULL OR id != ?2)",
        params![title, exclude.map(|id| id.to_string())],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Increment the view counter in place. Returns the new count.
pub fn increment_news_views(conn: &Connection, id: &Uuid) -> Result<i64, DatabaseError> {
    conn.execute(
        "UPDATE news SET views = views + 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(conn.query_row(
        "SELECT views FROM news WHERE id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewsOrder {
    #[default]
    Newest,
    MostViewed,
}

#[derive(Debug, Default)]
pub struct NewsFilter {
    pub published_only: bool,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub query: Option<String>,
    /// Also match the query against the category name.
    pub query_category: bool,
    pub order: NewsOrder,
    /// Negative for no limit.
    pub limit: i64,
    pub offset: i64,
}

fn news_conditions(filter: &NewsFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1;

    if filter.published_only {
        sql.push_str(" AND n.is_published = 1");
    }

    if let Some(category_id) = &filter.category_id {
        sql.push_str(&format!(" AND n.category_id = ?{param_idx}"));
        params_vec.push(Box::new(category_id.to_string()));
        param_idx += 1;
    }

    if let Some(name) = filter.category_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        sql.push_str(&format!(" AND LOWER(c.name) = LOWER(?{param_idx})"));
        params_vec.push(Box::new(name.to_string()));
        param_idx += 1;
    }

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let category = if filter.query_category {
            format!(" OR LOWER(c.name) LIKE ?{param_idx} ESCAPE '\\'")
        } else {
            String::new()
        };
        sql.push_str(&format!(
            " AND (LOWER(n.title) LIKE ?{p} ESCAPE '\\' OR LOWER(n.content) LIKE ?{p} ESCAPE '\\'{category})",
            p = param_idx
        ));
        params_vec.push(Box::new(like_pattern(query)));
    }

    (sql, params_vec)
}

pub fn count_news(conn: &Connection, filter: &NewsFilter) -> Result<i64, DatabaseError> {
    let (conditions, params_vec) = news_conditions(filter);
    let sql = format!(
        "SELECT COUNT(*) FROM news n LEFT JOIN news_categories c ON c.id = n.category_id{conditions}"
    );
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    Ok(conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?)
}

/// Filtered article listing. A negative `limit` returns every match.
pub fn list_news(conn: &Connection, filter: &NewsFilter) -> Result<Vec<News>, DatabaseError> {
    let (conditions, mut params_vec) = news_conditions(filter);
    let next_idx = params_vec.len() + 1;
    let order = match filter.order {
        NewsOrder::Newest => "n.created_at DESC, n.rowid DESC",
        NewsOrder::MostViewed => "n.views DESC, n.created_at DESC",
    };
    let sql = format!(
        "{NEWS_SELECT}{conditions} ORDER BY {order} LIMIT ?{} OFFSET ?{}",
        next_idx,
        next_idx + 1
    );
    params_vec.push(Box::new(filter.limit));
    params_vec.push(Box::new(filter.offset));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), news_from_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

// ═══════════════════════════════════════════════════════════
// Comments
// ═══════════════════════════════════════════════════════════

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        news_id: uuid_col(row, 1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        parent_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const COMMENT_SELECT: &str = "SELECT cm.id, cm.news_id, cm.user_id, u.username, cm.parent_id,
    cm.content, cm.created_at FROM comments cm JOIN users u ON u.id = cm.user_id";

pub fn insert_comment(
    conn: &Connection,
    news_id: &Uuid,
    user_id: i64,
    parent_id: Option<i64>,
    content: &str,
) -> Result<Comment, DatabaseError> {
    conn.execute(
        "INSERT INTO comments (news_id, user_id, parent_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![news_id.to_string(), user_id, parent_id, content, now()],
    )?;
    let id = conn.last_insert_rowid();
    get_comment(conn, id)?.ok_or_else(|| DatabaseError::not_found("Comment", id))
}

pub fn get_comment(conn: &Connection, id: i64) -> Result<Option<Comment>, DatabaseError> {
    let sql = format!("{COMMENT_SELECT} WHERE cm.id = ?1");
    Ok(conn.query_row(&sql, params![id], comment_from_row).optional()?)
}

/// Every comment of an article, oldest first.
pub fn list_comments(conn: &Connection, news_id: &Uuid) -> Result<Vec<Comment>, DatabaseError> {
    let sql = format!("{COMMENT_SELECT} WHERE cm.news_id = ?1 ORDER BY cm.created_at ASC, cm.id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![news_id.to_string()], comment_from_row)?;
    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

pub fn count_comments(conn: &Connection, news_id: &Uuid) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE news_id = ?1",
        params![news_id.to_string()],
        |row| row.get(0),
    )?)
}

/// Delete a comment; replies go with it.
pub fn delete_comment(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ═══════════════════════════════════════════════════════════
// Reactions
// ═══════════════════════════════════════════════════════════

pub fn get_reaction(
    conn: &Connection,
    news_id: &Uuid,
    user_id: i64,
) -> Result<Option<ReactionKind>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT reaction FROM news_reactions WHERE news_id = ?1 AND user_id = ?2",
            params![news_id.to_string(), user_id],
            |row| enum_col(row, 0),
        )
        .optional()?)
}

pub fn insert_reaction(
    conn: &Connection,
    news_id: &Uuid,
    user_id: i64,
    reaction: ReactionKind,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO news_reactions (news_id, user_id, reaction, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![news_id.to_string(), user_id, reaction.as_str(), now()],
    )?;
    Ok(())
}

pub fn update_reaction(
    conn: &Connection,
    news_id: &Uuid,
    user_id: i64,
    reaction: ReactionKind,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE news_reactions SET reaction = ?1, updated_at = ?2 WHERE news_id = ?3 AND user_id = ?4",
        params![reaction.as_str(), now(), news_id.to_string(), user_id],
    )?;
    Ok(())
}

pub fn delete_reaction(conn: &Connection, news_id: &Uuid, user_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM news_reactions WHERE news_id = ?1 AND user_id = ?2",
        params![news_id.to_string(), user_id],
    )?;
    Ok(())
}

/// Count per reaction kind, every kind present (zero when unused).
pub fn reaction_counts(
    conn: &Connection,
    news_id: &Uuid,
) -> Result<Vec<(ReactionKind, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT reaction, COUNT(*) FROM news_reactions WHERE news_id = ?1 GROUP BY reaction",
    )?;
    let rows = stmt.query_map(params![news_id.to_string()], |row| {
        Ok((enum_col::<ReactionKind>(row, 0)?, row.get::<_, i64>(1)?))
    })?;
    let mut counts: Vec<(ReactionKind, i64)> =
        ReactionKind::ALL.iter().map(|kind| (*kind, 0)).collect();
    for row in rows {
        let (kind, count) = row?;
        if let Some(slot) = counts.iter_mut().find(|(k, _)| *k == kind) {
            slot.1 = count;
        }
    }
    Ok(counts)
}
