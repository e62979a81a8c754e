use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{MatchStatus, Sport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scoreboard {
    pub id: i64,
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
