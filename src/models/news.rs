use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ReactionKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct News {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: Option<NewsCategory>,
    pub thumbnail: Option<String>,
    pub views: i64,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub source: String,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub news_id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsReaction {
    pub news_id: Uuid,
    pub user_id: i64,
    pub reaction: ReactionKind,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
