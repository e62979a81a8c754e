//! News portal: articles, categories, threaded comments and reactions.

pub mod import;

use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::Viewer;
use crate::db::{self, DatabaseError, NewsFields, NewsFilter};
use crate::models::{page_number, Comment, News, NewsCategory, Page, PageWindow, ReactionKind, User};
use crate::validation::{self, double_option, lenient_bool, lenient_i64, FieldErrors};

pub const NEWS_PAGE_SIZE: i64 = 9;
/// Articles at or above this view count are flagged hot.
pub const HOT_VIEWS: i64 = 100;
const TITLE_MAX: usize = 255;
const SUMMARY_MAX: usize = 500;
const SOURCE_MAX: usize = 255;
const CATEGORY_NAME_MAX: usize = 100;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("Unknown reaction: {0}")]
    InvalidReaction(String),
    #[error("Import failed: {0}")]
    Import(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for NewsError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<rusqlite::Error> for NewsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

fn require_staff(user: &User) -> Result<(), NewsError> {
    if user.is_staff_like() {
        Ok(())
    } else {
        Err(NewsError::Forbidden("Staff access required".into()))
    }
}

/// Published articles, plus unpublished ones for staff and their author.
fn visible_news(conn: &Connection, id: &Uuid, viewer: &Viewer) -> Result<News, NewsError> {
    let news = db::get_news(conn, id)?.ok_or(NewsError::NotFound("News"))?;
    if !news.is_published && !viewer.can_manage(news.author_id) {
        return Err(NewsError::NotFound("News"));
    }
    Ok(news)
}

// ═══════════════════════════════════════════════════════════
// Listing & detail
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewsQuery {
    /// Category UUID or name.
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsCard {
    #[serde(flatten)]
    pub news: News,
    pub is_hot: bool,
}

impl From<News> for NewsCard {
    fn from(news: News) -> Self {
        Self {
            is_hot: news.views >= HOT_VIEWS,
            news,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewsListing {
    #[serde(flatten)]
    pub page: Page<NewsCard>,
    pub category: Option<String>,
    pub q: Option<String>,
}

/// Published articles, newest first, nine per page.
pub fn list_news(conn: &Connection, query: &NewsQuery) -> Result<NewsListing, NewsError> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()).map(str::to_string);

    let mut filter = NewsFilter {
        published_only: true,
        query: q.clone(),
        ..NewsFilter::default()
    };
    match category.as_deref().map(Uuid::parse_str) {
        Some(Ok(id)) => filter.category_id = Some(id),
        Some(Err(_)) => filter.category_name = category.clone(),
        None => {}
    }

    let total = db::count_news(conn, &filter)?;
    let window = PageWindow::clamp(page_number(query.page.as_deref()), NEWS_PAGE_SIZE, total);
    filter.limit = window.limit;
    filter.offset = window.offset;
    let cards = db::list_news(conn, &filter)?.into_iter().map(NewsCard::from).collect();

    Ok(NewsListing {
        page: window.into_page(cards, total),
        category,
        q,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReactionCount {
    pub key: ReactionKind,
    pub label: &'static str,
    pub count: i64,
}

fn reaction_summary(conn: &Connection, news_id: &Uuid) -> Result<Vec<ReactionCount>, DatabaseError> {
    Ok(db::reaction_counts(conn, news_id)?
        .into_iter()
        .map(|(key, count)| ReactionCount {
            key,
            label: key.label(),
            count,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct NewsDetail {
    #[serde(flatten)]
    pub card: NewsCard,
    pub reactions: Vec<ReactionCount>,
    pub user_reaction: Option<ReactionKind>,
    pub comment_count: i64,
    pub can_edit: bool,
}

/// Counts a view and returns the article with its engagement summary.
pub fn news_detail(conn: &Connection, id: &Uuid, viewer: &Viewer) -> Result<NewsDetail, NewsError> {
    let mut news = visible_news(conn, id, viewer)?;
    news.views = db::increment_news_views(conn, id)?;

    let user_reaction = match viewer.user_id() {
        Some(user_id) => db::get_reaction(conn, id, user_id)?,
        None => None,
    };
    Ok(NewsDetail {
        reactions: reaction_summary(conn, id)?,
        user_reaction,
        comment_count: db::count_comments(conn, id)?,
        can_edit: viewer.can_manage(news.author_id),
        card: NewsCard::from(news),
    })
}

// ═══════════════════════════════════════════════════════════
// Create / update / delete
// ═══════════════════════════════════════════════════════════

/// Article form. On update, absent fields keep their stored value.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewsInput {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// Get-or-create a category by name.
    pub category_name: Option<String>,
    /// Existing category UUID; ignored when `category_name` is given.
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail: Option<Option<String>>,
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_published: Option<bool>,
}

struct NewsDraft {
    title: String,
    summary: String,
    content: String,
    category_id: Option<Uuid>,
    thumbnail: Option<String>,
    source: String,
    is_published: bool,
}

impl NewsDraft {
    fn from_news(news: &News) -> Self {
        Self {
            title: news.title.clone(),
            summary: news.summary.clone(),
            content: news.content.clone(),
            category_id: news.category.as_ref().map(|c| c.id),
            thumbnail: news.thumbnail.clone(),
            source: news.source.clone(),
            is_published: news.is_published,
        }
    }

    fn fields(&self) -> NewsFields<'_> {
        NewsFields {
            title: &self.title,
            summary: &self.summary,
            content: &self.content,
            category_id: self.category_id.as_ref(),
            thumbnail: self.thumbnail.as_deref(),
            source: &self.source,
            is_published: self.is_published,
        }
    }
}

fn apply_input(
    conn: &Connection,
    draft: &mut NewsDraft,
    input: &NewsInput,
    current: Option<&Uuid>,
) -> Result<(), NewsError> {
    let mut errors = FieldErrors::new();

    if current.is_none() || input.title.is_some() {
        draft.title = validation::required_text(&mut errors, "title", input.title.as_deref(), TITLE_MAX);
        if !errors.contains("title") && db::news_title_taken(conn, &draft.title, current)? {
            errors.add("title", "News with this Title already exists.");
        }
    }
    if current.is_none() || input.content.is_some() {
        draft.content = input.content.as_deref().map(str::trim).unwrap_or_default().to_string();
        if draft.content.is_empty() {
            errors.add("content", "This field is required.");
        }
    }
    if input.summary.is_some() {
        draft.summary = validation::optional_text(&mut errors, "summary", input.summary.as_deref(), SUMMARY_MAX);
    }
    if input.source.is_some() {
        draft.source = validation::optional_text(&mut errors, "source", input.source.as_deref(), SOURCE_MAX);
    }
    if let Some(thumbnail) = &input.thumbnail {
        draft.thumbnail = validation::optional_url(&mut errors, "thumbnail", thumbnail.as_deref());
    }
    if let Some(published) = input.is_published {
        draft.is_published = published;
    }

    let category_name = input.category_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if let Some(name) = category_name {
        if name.chars().count() > CATEGORY_NAME_MAX {
            errors.add(
                "category_name",
                format!("Ensure this value has at most {CATEGORY_NAME_MAX} characters."),
            );
        }
    } else if let Some(category) = &input.category {
        draft.category_id = match category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            None => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) if db::get_news_category(conn, &id)?.is_some() => Some(id),
                _ => {
                    errors.add("category", "Select a valid choice. That choice is not one of the available choices.");
                    None
                }
            },
        };
    }

    errors.into_result()?;
    if let Some(name) = category_name {
        draft.category_id = Some(db::get_or_create_news_category(conn, name)?.id);
    }
    Ok(())
}

fn title_conflict(e: DatabaseError) -> NewsError {
    if e.is_unique_violation() {
        NewsError::Validation(FieldErrors::single("title", "News with this Title already exists."))
    } else {
        NewsError::Database(e)
    }
}

/// Staff only. The author is the creating user.
pub fn create_news(conn: &Connection, user: &User, input: &NewsInput) -> Result<News, NewsError> {
    require_staff(user)?;
    let mut draft = NewsDraft {
        title: String::new(),
        summary: String::new(),
        content: String::new(),
        category_id: None,
        thumbnail: None,
        source: String::new(),
        is_published: false,
    };

    let tx = conn.unchecked_transaction()?;
    apply_input(&tx, &mut draft, input, None)?;
    let id = db::insert_news(&tx, &draft.fields(), Some(user.id)).map_err(title_conflict)?;
    tx.commit()?;

    tracing::info!(news_id = %id, author = user.id, "News created");
    db::get_news(conn, &id)?.ok_or(NewsError::NotFound("News"))
}

pub fn update_news(conn: &Connection, viewer: &Viewer, id: &Uuid, input: &NewsInput) -> Result<News, NewsError> {
    let news = db::get_news(conn, id)?.ok_or(NewsError::NotFound("News"))?;
    if !viewer.can_manage(news.author_id) {
        return Err(NewsError::Forbidden("Only the author or staff can edit this article".into()));
    }

    let mut draft = NewsDraft::from_news(&news);
    let tx = conn.unchecked_transaction()?;
    apply_input(&tx, &mut draft, input, Some(id))?;
    db::update_news(&tx, id, &draft.fields()).map_err(title_conflict)?;
    tx.commit()?;

    tracing::info!(news_id = %id, "News updated");
    db::get_news(conn, id)?.ok_or(NewsError::NotFound("News"))
}

pub fn delete_news(conn: &Connection, viewer: &Viewer, id: &Uuid) -> Result<(), NewsError> {
    let news = db::get_news(conn, id)?.ok_or(NewsError::NotFound("News"))?;
    if !viewer.can_manage(news.author_id) {
        return Err(NewsError::Forbidden("Only the author or staff can delete this article".into()));
    }
    db::delete_news(conn, id)?;
    tracing::info!(news_id = %id, "News deleted");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct NewsCategoryInput {
    pub name: Option<String>,
}

pub fn list_categories(conn: &Connection) -> Result<Vec<NewsCategory>, NewsError> {
    Ok(db::list_news_categories(conn)?)
}

pub fn add_category(conn: &Connection, user: &User, input: &NewsCategoryInput) -> Result<NewsCategory, NewsError> {
    require_staff(user)?;
    let mut errors = FieldErrors::new();
    let name = validation::required_text(&mut errors, "name", input.name.as_deref(), CATEGORY_NAME_MAX);
    if !errors.contains("name") && db::get_news_category_by_name(conn, &name)?.is_some() {
        errors.add("name", "News category with this Name already exists.");
    }
    errors.into_result()?;

    let category = db::insert_news_category(conn, &name)?;
    tracing::info!(category_id = %category.id, "News category created");
    Ok(category)
}

// ═══════════════════════════════════════════════════════════
// Comments
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

fn build_thread(parent: Option<i64>, children: &mut HashMap<Option<i64>, Vec<Comment>>) -> Vec<CommentNode> {
    children
        .remove(&parent)
        .unwrap_or_default()
        .into_iter()
        .map(|comment| {
            let replies = build_thread(Some(comment.id), children);
            CommentNode { comment, replies }
        })
        .collect()
}

/// Top-level comments oldest first, each with its nested replies.
pub fn comment_thread(conn: &Connection, news_id: &Uuid, viewer: &Viewer) -> Result<Vec<CommentNode>, NewsError> {
    visible_news(conn, news_id, viewer)?;
    let mut children: HashMap<Option<i64>, Vec<Comment>> = HashMap::new();
    for comment in db::list_comments(conn, news_id)? {
        children.entry(comment.parent_id).or_default().push(comment);
    }
    Ok(build_thread(None, &mut children))
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CommentInput {
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub parent: Option<i64>,
}

pub fn create_comment(
    conn: &Connection,
    viewer: &Viewer,
    user: &User,
    news_id: &Uuid,
    input: &CommentInput,
) -> Result<Comment, NewsError> {
    visible_news(conn, news_id, viewer)?;
    let mut errors = FieldErrors::new();
    let content = input.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        errors.add("content", "This field is required.");
    }
    if let Some(parent_id) = input.parent {
        match db::get_comment(conn, parent_id)? {
            Some(parent) if parent.news_id == *news_id => {}
            _ => errors.add("parent", "Parent comment does not belong to this article."),
        }
    }
    errors.into_result()?;

    let comment = db::insert_comment(conn, news_id, user.id, input.parent, content)?;
    tracing::debug!(comment_id = comment.id, news_id = %news_id, "Comment created");
    Ok(comment)
}

/// Author or staff. Replies are removed with their parent.
pub fn delete_comment(conn: &Connection, viewer: &Viewer, id: i64) -> Result<(), NewsError> {
    let comment = db::get_comment(conn, id)?.ok_or(NewsError::NotFound("Comment"))?;
    if !viewer.can_manage(Some(comment.user_id)) {
        return Err(NewsError::Forbidden("Only the author or staff can delete this comment".into()));
    }
    db::delete_comment(conn, id)?;
    tracing::debug!(comment_id = id, "Comment deleted");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Reactions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReactInput {
    #[serde(alias = "reaction_type")]
    pub reaction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReactionOutcome {
    pub status: &'static str,
    pub news_id: Uuid,
    pub user_reaction: Option<ReactionKind>,
    pub reactions: Vec<ReactionCount>,
}

/// Toggle: a new reaction is stored, the same one again removes it, a
/// different one replaces it.
pub fn react(
    conn: &Connection,
    viewer: &Viewer,
    user: &User,
    news_id: &Uuid,
    input: &ReactInput,
) -> Result<ReactionOutcome, NewsError> {
    let raw = input.reaction.as_deref().map(str::trim).unwrap_or_default();
    let kind: ReactionKind = raw
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| NewsError::InvalidReaction(raw.to_string()))?;
    visible_news(conn, news_id, viewer)?;

    let tx = conn.unchecked_transaction()?;
    let user_reaction = match db::get_reaction(&tx, news_id, user.id)? {
        None => {
            db::insert_reaction(&tx, news_id, user.id, kind)?;
            Some(kind)
        }
        Some(current) if current == kind => {
            db::delete_reaction(&tx, news_id, user.id)?;
            None
        }
        Some(_) => {
            db::update_reaction(&tx, news_id, user.id, kind)?;
            Some(kind)
        }
    };
    let reactions = reaction_summary(&tx, news_id)?;
    tx.commit()?;

    Ok(ReactionOutcome {
        status: "ok",
        news_id: *news_id,
        user_reaction,
        reactions,
    })
}
