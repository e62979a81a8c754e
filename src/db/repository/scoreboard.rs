use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::enum_col;
use crate::db::DatabaseError;
use crate::models::*;

const SCOREBOARD_COLUMNS: &str =
    "id, team1, team2, score1, score2, sport, status, match_date, logo_team1, logo_team2";

fn scoreboard_from_row(row: &Row<'_>) -> rusqlite::Result<Scoreboard> {
    Ok(Scoreboard {
        id: row.get(0)?,
        team1: row.get(1)?,
        team2: row.get(2)?,
        score1: row.get(3)?,
        score2: row.get(4)?,
        sport: enum_col(row, 5)?,
        status: enum_col(row, 6)?,
        match_date: row.get(7)?,
        logo_team1: row.get(8)?,
        logo_team2: row.get(9)?,
    })
}

/// Writable scoreboard fields.
#[derive(Debug, Clone)]
pub struct ScoreboardFields {
    pub team1: String,
    pub team2: String,
    pub score1: i64,
    pub score2: i64,
    pub sport: Sport,
    pub status: MatchStatus,
    pub match_date: NaiveDateTime,
    pub logo_team1: Option<String>,
    pub logo_team2: Option<String>,
}

pub fn insert_scoreboard(conn: &Connection, f: &ScoreboardFields) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO scoreboards (team1, team2, score1, score2, sport, status, match_date,
         logo_team1, logo_team2) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            f.team1,
            f.team2,
            f.score1,
            f.score2,
            f.sport.as_str(),
            f.status.as_str(),
            f.match_date,
            f.logo_team1,
            f.logo_team2
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert with an explicit id, or overwrite the row that has it.
/// Returns true when a new row was created.
pub fn upsert_scoreboard(conn: &Connection, id: i64, f: &ScoreboardFields) -> Result<bool, DatabaseError> {
    let existed = get_scoreboard(conn, id)?.is_some();
    conn.execute(
        "INSERT INTO scoreboards (id, team1, team2, score1, score2, sport, status, match_date,
         logo_team1, logo_team2) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT (id) DO UPDATE SET team1 = excluded.team1, team2 = excluded.team2,
         score1 = excluded.score1, score2 = excluded.score2, sport = excluded.sport,
         status = excluded.status, match_date = excluded.match_date,
         logo_team1 = excluded.logo_team1, logo_team2 = excluded.logo_team2",
        params![
            id,
            f.team1,
            f.team2,
            f.score1,
            f.score2,
            f.sport.as_str(),
            f.status.as_str(),
            f.match_date,
            f.logo_team1,
            f.logo_team2
        ],
    )?;
    Ok(!existed)
}

pub fn update_scoreboard(conn: &Connection, id: i64, f: &ScoreboardFields) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE scoreboards SET team1 = ?1, team2 = ?2, score1 = ?3, score2 = ?4, sport = ?5,
         status = ?6, match_date = ?7, logo_team1 = ?8, logo_team2 = ?9 WHERE id = ?10",
        params![
            f.team1,
            f.team2,
            f.score1,
            f.score2,
            f.sport.as_str(),
            f.status.as_str(),
            f.match_date,
            f.logo_team1,
            f.logo_team2,
            id
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Scoreboard", id));
    }
    Ok(())
}

pub fn delete_scoreboard(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM scoreboards WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn get_scoreboard(conn: &Connection, id: i64) -> Result<Option<Scoreboard>, DatabaseError> {
    let sql = format!("SELECT {SCOREBOARD_COLUMNS} FROM scoreboards WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], scoreboard_from_row).optional()?)
}

/// Matches filtered by stored status and sport, newest match date first.
pub fn list_scoreboards(
    conn: &Connection,
    status: Option<MatchStatus>,
    sport: Option<Sport>,
) -> Result<Vec<Scoreboard>, DatabaseError> {
    let sql = format!(
        "SELECT {SCOREBOARD_COLUMNS} FROM scoreboards
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR sport = ?2)
         ORDER BY match_date DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), sport.map(|s| s.as_str())],
        scoreboard_from_row,
    )?;
    let mut boards = Vec::new();
    for row in rows {
        boards.push(row?);
    }
    Ok(boards)
}
