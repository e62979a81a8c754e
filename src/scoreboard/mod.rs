//! Live scores for NBA, NFL and EPL matches.

mod import;

pub use import::*;

use chrono::{DateTime, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{self, DatabaseError, ScoreboardFields};
use crate::models::{MatchStatus, Scoreboard, Sport, User};
use crate::validation::{self, lenient_i64, FieldErrors};

const TEAM_MAX: usize = 50;

#[derive(Error, Debug)]
pub enum ScoreboardError {
    #[error("Scoreboard not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("Import failed: {0}")]
    Import(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for ScoreboardError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

fn require_staff(user: &User) -> Result<(), ScoreboardError> {
    if user.is_staff_like() {
        Ok(())
    } else {
        Err(ScoreboardError::Forbidden("Staff access required".into()))
    }
}

/// Accepts the `datetime-local` form format (`YYYY-MM-DDTHH:MM`), the same
/// with seconds or a space separator, and RFC 3339 (converted to UTC).
pub fn parse_match_date(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

// ── Views ───────────────────────────────────────────────────

/// Public shape of a match. Stored `recent` is reported as `finished`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardView {
    pub id: i64,
    pub team1: String,
    pub team2: String,
    pub score1: i64,
    pub score2: i64,
    pub sport: Sport,
    pub sport_display: &'static str,
    pub status: &'static str,
    pub match_date: NaiveDateTime,
    pub logo_team1: Option<String>,
    pub logo_team2: Option<String>,
}

impl From<Scoreboard> for ScoreboardView {
    fn from(s: Scoreboard) -> Self {
        Self {
            id: s.id,
            sport_display: s.sport.display_name(),
            status: s.status.public_label(),
            team1: s.team1,
            team2: s.team2,
            score1: s.score1,
            score2: s.score2,
            sport: s.sport,
            match_date: s.match_date,
            logo_team1: s.logo_team1,
            logo_team2: s.logo_team2,
        }
    }
}

fn views(rows: Vec<Scoreboard>) -> Vec<ScoreboardView> {
    rows.into_iter().map(ScoreboardView::from).collect()
}

#[derive(Debug, Serialize)]
pub struct Board {
    pub live: Vec<ScoreboardView>,
    pub finished: Vec<ScoreboardView>,
    pub upcoming: Vec<ScoreboardView>,
}

/// Every match grouped by status, newest match date first.
pub fn board(conn: &Connection) -> Result<Board, ScoreboardError> {
    Ok(Board {
        live: views(db::list_scoreboards(conn, Some(MatchStatus::Live), None)?),
        finished: views(db::list_scoreboards(conn, Some(MatchStatus::Recent), None)?),
        upcoming: views(db::list_scoreboards(conn, Some(MatchStatus::Upcoming), None)?),
    })
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScoreFilter {
    pub status: Option<String>,
    pub sport: Option<String>,
}

/// Filtered list. Unknown status or sport values match nothing.
pub fn filter_scores(conn: &Connection, filter: &ScoreFilter) -> Result<Vec<ScoreboardView>, ScoreboardError> {
    let status = match filter.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match MatchStatus::from_public(raw) {
            Some(status) => Some(status),
            None => return Ok(Vec::new()),
        },
    };
    let sport = match filter.sport.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.to_ascii_uppercase().parse::<Sport>() {
            Ok(sport) => Some(sport),
            Err(_) => return Ok(Vec::new()),
        },
    };
    Ok(views(db::list_scoreboards(conn, status, sport)?))
}

// ── Create / update / delete ────────────────────────────────

/// Match form. Legacy field names are accepted as aliases.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScoreboardInput {
    #[serde(alias = "tim1")]
    pub team1: Option<String>,
    #[serde(alias = "tim2")]
    pub team2: Option<String>,
    #[serde(default, alias = "skor_tim1", deserialize_with = "lenient_i64")]
    pub score1: Option<i64>,
    #[serde(default, alias = "skor_tim2", deserialize_with = "lenient_i64")]
    pub score2: Option<i64>,
    pub sport: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "tanggal", alias = "date")]
    pub match_date: Option<String>,
    #[serde(alias = "logo_tim1")]
    pub logo_team1: Option<String>,
    #[serde(alias = "logo_tim2")]
    pub logo_team2: Option<String>,
}

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

fn validate(input: &ScoreboardInput) -> Result<ScoreboardFields, ScoreboardError> {
    let mut errors = FieldErrors::new();
    let team1 = validation::required_text(&mut errors, "team1", input.team1.as_deref(), TEAM_MAX);
    let team2 = validation::required_text(&mut errors, "team2", input.team2.as_deref(), TEAM_MAX);

    let mut score = |field: &str, value: Option<i64>| match value {
        None => {
            errors.add(field, "This field is required.");
            0
        }
        Some(v) if v < 0 => {
            errors.add(field, "Ensure this value is greater than or equal to 0.");
            0
        }
        Some(v) => v,
    };
    let score1 = score("score1", input.score1);
    let score2 = score("score2", input.score2);

    let sport = match input.sport.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add("sport", "This field is required.");
            Sport::Nba
        }
        Some(raw) => raw.to_ascii_uppercase().parse().unwrap_or_else(|_| {
            errors.add("sport", INVALID_CHOICE);
            Sport::Nba
        }),
    };
    let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add("status", "This field is required.");
            MatchStatus::Upcoming
        }
        Some(raw) => MatchStatus::from_public(raw).unwrap_or_else(|| {
            errors.add("status", INVALID_CHOICE);
            MatchStatus::Upcoming
        }),
    };
    let match_date = match input.match_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            errors.add("match_date", "This field is required.");
            db::now()
        }
        Some(raw) => parse_match_date(raw).unwrap_or_else(|| {
            errors.add("match_date", "Enter a valid date/time.");
            db::now()
        }),
    };
    let logo_team1 = validation::optional_url(&mut errors, "logo_team1", input.logo_team1.as_deref());
    let logo_team2 = validation::optional_url(&mut errors, "logo_team2", input.logo_team2.as_deref());

    errors.into_result()?;
    Ok(ScoreboardFields {
        team1,
        team2,
        score1,
        score2,
        sport,
        status,
        match_date,
        logo_team1,
        logo_team2,
    })
}

fn fetch(conn: &Connection, id: i64) -> Result<ScoreboardView, ScoreboardError> {
    db::get_scoreboard(conn, id)?
        .map(ScoreboardView::from)
        .ok_or(ScoreboardError::NotFound)
}

pub fn create_score(conn: &Connection, user: &User, input: &ScoreboardInput) -> Result<ScoreboardView, ScoreboardError> {
    require_staff(user)?;
    let fields = validate(input)?;
    let id = db::insert_scoreboard(conn, &fields)?;
    tracing::info!(scoreboard_id = id, "Scoreboard created");
    fetch(conn, id)
}

/// Full replacement of a match.
pub fn update_score(
    conn: &Connection,
    user: &User,
    id: i64,
    input: &ScoreboardInput,
) -> Result<ScoreboardView, ScoreboardError> {
    require_staff(user)?;
    db::get_scoreboard(conn, id)?.ok_or(ScoreboardError::NotFound)?;
    let fields = validate(input)?;
    db::update_scoreboard(conn, id, &fields)?;
    fetch(conn, id)
}

pub fn delete_score(conn: &Connection, user: &User, id: i64) -> Result<(), ScoreboardError> {
    require_staff(user)?;
    if !db::delete_scoreboard(conn, id)? {
        return Err(ScoreboardError::NotFound);
    }
    tracing::info!(scoreboard_id = id, "Scoreboard deleted");
    Ok(())
}
