//! CSV import of match rows.
//!
//! Columns: `id?,team1,team2,score1,score2,sport,status,date,logo_team1?,logo_team2?`.
//! The older headers `tim1,tim2,skor_tim1,skor_tim2,tanggal,logo_tim1,logo_tim2`
//! are accepted too.

use std::collections::HashMap;
use std::io::Read;

use rusqlite::Connection;
use serde::Serialize;

use super::{parse_match_date, ScoreboardError};
use crate::db::{self, DatabaseError, ScoreboardFields};
use crate::models::{MatchStatus, Sport};

const REQUIRED: &[&str] = &["team1", "team2", "score1", "score2", "sport", "status", "date"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

fn canonical_header(raw: &str) -> String {
    let name = raw.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    match name.as_str() {
        "tim1" => "team1",
        "tim2" => "team2",
        "skor_tim1" => "score1",
        "skor_tim2" => "score2",
        "tanggal" | "match_date" => "date",
        "logo_tim1" => "logo_team1",
        "logo_tim2" => "logo_team2",
        other => other,
    }
    .to_string()
}

struct Row<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl Row<'_> {
    fn get(&self, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|&idx| self.record.get(idx))
            .map(str::trim)
            .unwrap_or_default()
    }

    fn score(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            "" => Some(0),
            raw => raw.parse().ok(),
        }
    }

    fn logo(&self, column: &str) -> Option<String> {
        Some(self.get(column)).filter(|v| !v.is_empty()).map(str::to_string)
    }

    /// Lenient field mapping: unknown sport is NBA, unknown status is
    /// upcoming, an unreadable date is now. `None` means skip the row.
    fn fields(&self) -> Option<ScoreboardFields> {
        let team1 = self.get("team1");
        let team2 = self.get("team2");
        if team1.is_empty() || team2.is_empty() {
            return None;
        }
        let score1 = self.score("score1")?;
        let score2 = self.score("score2")?;

        Some(ScoreboardFields {
            team1: team1.to_string(),
            team2: team2.to_string(),
            score1,
            score2,
            sport: self.get("sport").to_ascii_uppercase().parse().unwrap_or(Sport::Nba),
            status: MatchStatus::from_public(self.get("status")).unwrap_or(MatchStatus::Upcoming),
            match_date: parse_match_date(self.get("date")).unwrap_or_else(db::now),
            logo_team1: self.logo("logo_team1"),
            logo_team2: self.logo("logo_team2"),
        })
    }
}

/// Import every row in one transaction. Rows with a positive `id` upsert
/// that match; the rest are inserted.
pub fn import_scoreboard_csv<R: Read>(conn: &Connection, reader: R) -> Result<ScoreImportSummary, ScoreboardError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| ScoreboardError::Import(format!("unreadable header: {e}")))?;
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (canonical_header(name), idx))
        .collect();

    let missing: Vec<&str> = REQUIRED.iter().copied().filter(|c| !columns.contains_key(*c)).collect();
    if !missing.is_empty() {
        return Err(ScoreboardError::Import(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut summary = ScoreImportSummary::default();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| ScoreboardError::Import(format!("row {}: {e}", line + 2)))?;
        let row = Row {
            columns: &columns,
            record: &record,
        };
        let Some(fields) = row.fields() else {
            tracing::debug!(row = line + 2, "Skipping scoreboard row");
            summary.skipped += 1;
            continue;
        };

        match row.get("id").parse::<i64>().ok().filter(|id| *id > 0) {
            Some(id) => {
                if db::upsert_scoreboard(&tx, id, &fields)? {
                    summary.created += 1;
                } else {
                    summary.updated += 1;
                }
            }
            None => {
                db::insert_scoreboard(&tx, &fields)?;
                summary.created += 1;
            }
        }
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        "Scoreboard import complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    const LEGACY: &str = "\
id,tim1,tim2,skor_tim1,skor_tim2,sport,status,tanggal,logo_tim1,logo_tim2
5,LAL,BOS,101,99,nba,finished,2025-03-01 19:30:00,https://logo/lal.png,
,Arsenal,Chelsea,2,1,EPL,live,2025-03-02T20:00,,
,,Chelsea,2,1,EPL,live,2025-03-02T20:00,,
,KC,SF,x,3,NFL,live,2025-03-02T20:00,,
,Bulls,Heat,,,UFC,paused,someday,,
";

    #[test]
    fn legacy_headers_and_defaults() {
        let conn = open_memory_database().unwrap();
        let summary = import_scoreboard_csv(&conn, LEGACY.as_bytes()).unwrap();
        assert_eq!(summary, ScoreImportSummary { created: 3, updated: 0, skipped: 2 });

        let lal = db::get_scoreboard(&conn, 5).unwrap().unwrap();
        assert_eq!(lal.sport, Sport::Nba);
        assert_eq!(lal.status, MatchStatus::Recent);
        assert_eq!(lal.logo_team1.as_deref(), Some("https://logo/lal.png"));
        assert_eq!(lal.logo_team2, None);

        let all = db::list_scoreboards(&conn, None, None).unwrap();
        let bulls = all.iter().find(|s| s.team1 == "Bulls").unwrap();
        assert_eq!((bulls.score1, bulls.score2), (0, 0));
        assert_eq!(bulls.sport, Sport::Nba);
        assert_eq!(bulls.status, MatchStatus::Upcoming);
    }

    #[test]
    fn rows_with_id_update_on_reimport() {
        let conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        std::fs::write(
            &path,
            "id,team1,team2,score1,score2,sport,status,date\n9,LAL,BOS,1,0,NBA,live,2025-03-01T19:30\n",
        )
        .unwrap();
        let first = import_scoreboard_csv(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(first.created, 1);

        std::fs::write(
            &path,
            "id,team1,team2,score1,score2,sport,status,date\n9,LAL,BOS,110,104,NBA,finished,2025-03-01T19:30\n",
        )
        .unwrap();
        let second = import_scoreboard_csv(&conn, std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(second, ScoreImportSummary { created: 0, updated: 1, skipped: 0 });
        assert_eq!(db::get_scoreboard(&conn, 9).unwrap().unwrap().score1, 110);
    }

    #[test]
    fn missing_columns_abort() {
        let conn = open_memory_database().unwrap();
        let err = import_scoreboard_csv(&conn, "team1,team2\nA,B\n".as_bytes()).unwrap_err();
        let ScoreboardError::Import(message) = err else { panic!("expected import error") };
        assert!(message.contains("score1"));
        assert!(message.contains("date"));
        assert!(db::list_scoreboards(&conn, None, None).unwrap().is_empty());
    }
}
