//! Bearer-token sessions.
//!
//! The client holds an opaque token; the database only stores the hex
//! SHA-256 digest of it as the session id. Every authenticated request
//! slides the expiry window forward.

use base64::Engine;
use chrono::Duration;
use rusqlite::Connection;

use super::AccountError;
use crate::db::{self, now, DatabaseError};
use crate::models::{Session, User};

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Session primary key for a token.
pub fn session_id_for(token: &str) -> String {
    use std::fmt::Write;
    hash_token(token).iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// A session together with the only copy of its plaintext token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

pub fn issue_session(
    conn: &Connection,
    user_id: Option<i64>,
    ttl: Duration,
) -> Result<IssuedSession, DatabaseError> {
    let token = generate_token();
    let session = db::insert_session(conn, &session_id_for(&token), user_id, now() + ttl)?;
    Ok(IssuedSession { token, session })
}

/// Resolve a token to a live session, sliding its expiry. Unknown tokens
/// yield `None`; expired sessions are deleted and yield `None`.
pub fn open_session(
    conn: &Connection,
    token: &str,
    ttl: Duration,
) -> Result<Option<Session>, DatabaseError> {
    let id = session_id_for(token);
    let Some(mut session) = db::get_session(conn, &id)? else {
        return Ok(None);
    };
    let at = now();
    if session.is_expired(at) {
        db::delete_session(conn, &id)?;
        return Ok(None);
    }
    session.last_seen = at;
    session.expires_at = at + ttl;
    db::touch_session(conn, &id, session.last_seen, session.expires_at)?;
    Ok(Some(session))
}

/// Bind a fresh session to `user`. The previous session (if any) is
/// replaced: its guest cart is merged into the user's cart, its recent
/// searches carry over, and the row is deleted.
pub fn login(
    conn: &Connection,
    previous: Option<&Session>,
    user: &User,
    ttl: Duration,
) -> Result<IssuedSession, AccountError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

    let mut issued = issue_session(&tx, Some(user.id), ttl)?;

    if let Some(previous) = previous {
        if previous.user_id.is_none() {
            if let Some(guest_cart) = db::find_session_cart(&tx, &previous.id)? {
                let user_cart = db::get_or_create_user_cart(&tx, user.id)?;
                let moved = db::merge_carts(&tx, guest_cart.id, user_cart.id)?;
                tracing::debug!(user_id = user.id, lines = moved, "Merged guest cart");
            }
        }
        if !previous.recent_searches.is_empty() {
            db::set_recent_searches(&tx, &issued.session.id, &previous.recent_searches)?;
            issued.session.recent_searches = previous.recent_searches.clone();
        }
        db::delete_session(&tx, &previous.id)?;
    }

    db::touch_last_login(&tx, user.id, now())?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(issued)
}

pub fn logout(conn: &Connection, session: &Session) -> Result<(), DatabaseError> {
    db::delete_session(conn, &session.id)?;
    if let Some(user_id) = session.user_id {
        tracing::info!(user_id, "User logged out");
    }
    Ok(())
}

pub fn purge_expired_sessions(conn: &Connection) -> Result<usize, DatabaseError> {
    db::delete_expired_sessions(conn, now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures;
    use crate::models::{Money, RecentSearch, SearchScope};

    fn ttl() -> Duration {
        Duration::days(14)
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 43);
    }

    #[test]
    fn session_id_is_hex_digest() {
        let id = session_id_for("token-a");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, session_id_for("token-a"));
        assert_ne!(id, session_id_for("token-b"));
    }

    #[test]
    fn open_session_slides_expiry() {
        let conn = open_memory_database().unwrap();
        let issued = issue_session(&conn, None, Duration::minutes(5)).unwrap();
        let opened = open_session(&conn, &issued.token, ttl()).unwrap().unwrap();
        assert_eq!(opened.id, issued.session.id);
        assert!(opened.expires_at > issued.session.expires_at);
    }

    #[test]
    fn unknown_token_has_no_session() {
        let conn = open_memory_database().unwrap();
        assert!(open_session(&conn, "nope", ttl()).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_removed_on_open() {
        let conn = open_memory_database().unwrap();
        let issued = issue_session(&conn, None, Duration::seconds(-1)).unwrap();
        assert!(open_session(&conn, &issued.token, ttl()).unwrap().is_none());
        assert!(db::get_session(&conn, &issued.session.id).unwrap().is_none());
    }

    #[test]
    fn login_rotates_token_and_merges_guest_cart() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let cat = fixtures::category(&conn, "Shoes");
        let product = fixtures::product(&conn, cat.id, "Runner", 10_000, 9, None);

        let mut guest = issue_session(&conn, None, ttl()).unwrap();
        guest.session.recent_searches = vec![RecentSearch {
            query: "jersey".into(),
            scope: SearchScope::All,
            news_count: 1,
            product_count: 2,
            timestamp: now(),
        }];
        db::set_recent_searches(&conn, &guest.session.id, &guest.session.recent_searches).unwrap();
        let guest_cart = db::get_or_create_session_cart(&conn, &guest.session.id).unwrap();
        db::upsert_cart_item(&conn, guest_cart.id, &product.id, 2, Money(10_000)).unwrap();
        let user_cart = db::get_or_create_user_cart(&conn, user.id).unwrap();
        db::upsert_cart_item(&conn, user_cart.id, &product.id, 1, Money(10_000)).unwrap();

        let issued = login(&conn, Some(&guest.session), &user, ttl()).unwrap();

        assert_ne!(issued.token, guest.token);
        assert_eq!(issued.session.user_id, Some(user.id));
        assert!(db::get_session(&conn, &guest.session.id).unwrap().is_none());
        assert_eq!(db::cart_item_count(&conn, user_cart.id).unwrap(), 3);
        let stored = db::get_session(&conn, &issued.session.id).unwrap().unwrap();
        assert_eq!(stored.recent_searches.len(), 1);
        assert!(db::get_user(&conn, user.id).unwrap().unwrap().last_login.is_some());
    }

    #[test]
    fn login_without_previous_session() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let issued = login(&conn, None, &user, ttl()).unwrap();
        assert!(open_session(&conn, &issued.token, ttl()).unwrap().is_some());
    }

    #[test]
    fn logout_deletes_session() {
        let conn = open_memory_database().unwrap();
        let user = fixtures::user(&conn, "budi", false);
        let issued = login(&conn, None, &user, ttl()).unwrap();
        logout(&conn, &issued.session).unwrap();
        assert!(open_session(&conn, &issued.token, ttl()).unwrap().is_none());
    }

    #[test]
    fn purge_removes_only_expired() {
        let conn = open_memory_database().unwrap();
        issue_session(&conn, None, Duration::seconds(-5)).unwrap();
        let live = issue_session(&conn, None, ttl()).unwrap();
        assert_eq!(purge_expired_sessions(&conn).unwrap(), 1);
        assert!(db::get_session(&conn, &live.session.id).unwrap().is_some());
    }
}
