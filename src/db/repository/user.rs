use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{now, DatabaseError};
use crate::models::{RecentSearch, Session, User};

const USER_COLUMNS: &str =
    "id, username, email, is_staff, is_superuser, is_active, date_joined, last_login";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_staff: row.get(3)?,
        is_superuser: row.get(4)?,
        is_active: row.get(5)?,
        date_joined: row.get(6)?,
        last_login: row.get(7)?,
    })
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

pub fn insert_user(conn: &Connection, new: &NewUser<'_>) -> Result<User, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, is_staff, is_superuser, is_active, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            new.username,
            new.email,
            new.password_hash,
            new.is_staff,
            new.is_superuser,
            now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_user(conn, id)?.ok_or_else(|| DatabaseError::not_found("User", id))
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

pub fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
    Ok(conn.query_row(&sql, params![username], user_from_row).optional()?)
}

/// User plus the stored password hash, for credential checks.
pub fn get_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(User, String)>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1");
    Ok(conn
        .query_row(&sql, params![username], |row| {
            Ok((user_from_row(row)?, row.get::<_, String>(8)?))
        })
        .optional()?)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn set_password_hash(conn: &Connection, user_id: i64, hash: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hash, user_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }
    Ok(())
}

pub fn set_staff(conn: &Connection, user_id: i64, is_staff: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET is_staff = ?1 WHERE id = ?2",
        params![is_staff, user_id],
    )?;
    Ok(())
}

pub fn set_active(conn: &Connection, user_id: i64, is_active: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET is_active = ?1 WHERE id = ?2",
        params![is_active, user_id],
    )?;
    Ok(())
}

pub fn touch_last_login(
    conn: &Connection,
    user_id: i64,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET last_login = ?1 WHERE id = ?2",
        params![at, user_id],
    )?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let recent_raw: String = row.get(2)?;
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        // A corrupt history is dropped rather than failing the request.
        recent_searches: serde_json::from_str(&recent_raw).unwrap_or_default(),
        created_at: row.get(3)?,
        last_seen: row.get(4)?,
        expires_at: row.get(5)?,
    })
}

pub fn insert_session(
    conn: &Connection,
    id: &str,
    user_id: Option<i64>,
    expires_at: NaiveDateTime,
) -> Result<Session, DatabaseError> {
    let at = now();
    conn.execute(
        "INSERT INTO sessions (id, user_id, recent_searches, created_at, last_seen, expires_at)
         VALUES (?1, ?2, '[]', ?3, ?3, ?4)",
        params![id, user_id, at, expires_at],
    )?;
    Ok(Session {
        id: id.to_string(),
        user_id,
        recent_searches: Vec::new(),
        created_at: at,
        last_seen: at,
        expires_at,
    })
}

pub fn get_session(conn: &Connection, id: &str) -> Result<Option<Session>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, recent_searches, created_at, last_seen, expires_at
             FROM sessions WHERE id = ?1",
            params![id],
            session_from_row,
        )
        .optional()?)
}

/// Slide the session window forward.
pub fn touch_session(
    conn: &Connection,
    id: &str,
    last_seen: NaiveDateTime,
    expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE sessions SET last_seen = ?1, expires_at = ?2 WHERE id = ?3",
        params![last_seen, expires_at, id],
    )?;
    Ok(())
}

pub fn set_recent_searches(
    conn: &Connection,
    id: &str,
    recent: &[RecentSearch],
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(recent)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("recent searches: {e}")))?;
    conn.execute(
        "UPDATE sessions SET recent_searches = ?1 WHERE id = ?2",
        params![json, id],
    )?;
    Ok(())
}

pub fn delete_session(conn: &Connection, id: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
    Ok(())
}

/// Remove every session whose expiry is at or before `now`. Returns the count.
pub fn delete_expired_sessions(conn: &Connection, now: NaiveDateTime) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?)
}
