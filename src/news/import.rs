//! Bulk import of scraped sport news from a JSON array.
//!
//! Each entry carries `title`, `content`, `image_url`, `source_url` and an
//! optional ISO `published_date`. Stories land published in the
//! "Olahraga" category. Titles already present are left untouched.

use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::NewsError;
use crate::db::{self, DatabaseError, NewsFields};

pub const IMPORT_CATEGORY: &str = "Olahraga";

#[derive(Debug, Deserialize)]
struct ImportedStory {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NewsImportSummary {
    pub created: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Parse an ISO timestamp or bare date. Offsets are normalised to UTC.
pub fn parse_published_date(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_utc())
        .or_else(|| FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Insert every new story. Entries without a title or content are skipped,
/// titles already stored (or repeated earlier in the file) count as
/// duplicates. Runs in one transaction.
pub fn import_news_json<R: Read>(conn: &Connection, reader: R) -> Result<NewsImportSummary, NewsError> {
    let entries: Vec<ImportedStory> =
        serde_json::from_reader(reader).map_err(|e| NewsError::Import(format!("invalid JSON: {e}")))?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let category = db::get_or_create_news_category(&tx, IMPORT_CATEGORY)?;
    let mut seen = HashSet::new();
    let mut summary = NewsImportSummary::default();

    for entry in &entries {
        let (Some(title), Some(content)) = (non_empty(entry.title.as_deref()), non_empty(entry.content.as_deref()))
        else {
            summary.skipped += 1;
            continue;
        };
        if !seen.insert(title) || db::news_title_taken(&tx, title, None)? {
            tracing::debug!(title, "Skipping duplicate story");
            summary.duplicates += 1;
            continue;
        }

        let id = db::insert_news(
            &tx,
            &NewsFields {
                title,
                summary: "",
                content,
                category_id: Some(&category.id),
                thumbnail: non_empty(entry.image_url.as_deref()),
                source: entry.source_url.as_deref().unwrap_or_default(),
                is_published: true,
            },
            None,
        )?;
        match entry.published_date.as_deref().and_then(parse_published_date) {
            Some(published) => db::set_news_created_at(&tx, &id, published)?,
            None => tracing::debug!(title, "No usable publish date, keeping import time"),
        }
        summary.created += 1;
    }

    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(
        created = summary.created,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "News import complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use serde_json::json;

    fn write_json(dir: &tempfile::TempDir, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("news.json");
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn story_by_title(conn: &Connection, title: &str) -> crate::models::News {
        let id: String = conn
            .query_row("SELECT id FROM news WHERE title = ?1", [title], |row| row.get(0))
            .unwrap();
        db::get_news(conn, &id.parse().unwrap()).unwrap().unwrap()
    }

    #[test]
    fn published_dates_parse() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(14, 30, 0).unwrap();
        assert_eq!(parse_published_date("2024-03-09T14:30:00"), Some(expected));
        assert_eq!(parse_published_date("2024-03-09T21:30:00+07:00"), Some(expected));
        assert_eq!(parse_published_date("2024-03-09 14:30:00"), Some(expected));
        assert_eq!(parse_published_date("2024-03-09T14:30"), Some(expected));
        assert_eq!(
            parse_published_date("2024-03-09"),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_published_date("Sabtu, 09 Mar 2024"), None);
        assert_eq!(parse_published_date(""), None);
    }

    #[test]
    fn import_skips_incomplete_and_duplicate_stories() {
        let conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            json!([
                {"title": "Timnas menang", "content": "Skor 2-0.", "image_url": "https://img.example.com/a.jpg",
                 "source_url": "https://news.example.com/a", "published_date": "2024-03-09T14:30:00"},
                {"title": "Tanpa isi", "content": "   "},
                {"content": "Tanpa judul"},
                {"title": "Timnas menang", "content": "Versi lain."},
                {"title": "Liga dimulai", "content": "Pekan pertama.", "published_date": "kemarin"}
            ]),
        );

        let summary = import_news_json(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(summary, NewsImportSummary { created: 2, duplicates: 1, skipped: 2 });

        let win = story_by_title(&conn, "Timnas menang");
        assert_eq!(win.content, "Skor 2-0.");
        assert!(win.is_published);
        assert_eq!(win.thumbnail.as_deref(), Some("https://img.example.com/a.jpg"));
        assert_eq!(win.source, "https://news.example.com/a");
        assert_eq!(win.category.as_ref().map(|c| c.name.as_str()), Some(IMPORT_CATEGORY));
        assert_eq!(win.created_at, parse_published_date("2024-03-09T14:30:00").unwrap());

        let league = story_by_title(&conn, "Liga dimulai");
        assert!(league.thumbnail.is_none());
        assert!((db::now() - league.created_at).num_minutes() < 5);

        let again = import_news_json(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(again, NewsImportSummary { created: 0, duplicates: 3, skipped: 2 });
    }

    #[test]
    fn import_reuses_existing_category() {
        let conn = open_memory_database().unwrap();
        let existing = db::get_or_create_news_category(&conn, IMPORT_CATEGORY).unwrap();
        import_news_json(&conn, json!([{"title": "A", "content": "B"}]).to_string().as_bytes()).unwrap();
        let story = story_by_title(&conn, "A");
        assert_eq!(story.category.map(|c| c.id), Some(existing.id));
    }

    #[test]
    fn invalid_json_is_reported() {
        let conn = open_memory_database().unwrap();
        let err = import_news_json(&conn, "{\"title\": 1}".as_bytes()).unwrap_err();
        assert!(matches!(err, NewsError::Import(_)));
    }
}
