use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::search::RecentSearch;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

impl User {
    /// Staff-level privileges (superusers included).
    pub fn is_staff_like(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Server-side session. `id` is the hex SHA-256 digest of the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i64>,
    pub recent_searches: Vec<RecentSearch>,
    pub created_at: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}
