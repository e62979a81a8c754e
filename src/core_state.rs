//! Shared application state for the HTTP layer and the CLI.
//!
//! `CoreState` owns the single SQLite connection behind a `Mutex`.
//! Guards returned by [`CoreState::db`] must be dropped before any `.await`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::accounts::PasswordHasher;
use crate::config::Config;
use crate::db;

// ═══════════════════════════════════════════════════════════
// CoreState: shared by every handler
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    conn: Mutex<Connection>,
    pub config: Config,
}

impl CoreState {
    /// Open (and migrate) the database at `config.db_path`.
    pub fn open(config: Config) -> Result<Self, CoreError> {
        let conn = db::open_database(Path::new(&config.db_path))?;
        tracing::info!(path = %config.db_path.display(), "Database ready");
        Ok(Self::with_connection(conn, config))
    }

    /// In-memory database, for tests and dry runs.
    pub fn in_memory(config: Config) -> Result<Self, CoreError> {
        let conn = db::open_memory_database()?;
        Ok(Self::with_connection(conn, config))
    }

    pub fn with_connection(conn: Connection, config: Config) -> Self {
        Self {
            conn: Mutex::new(conn),
            config,
        }
    }

    /// Lock the database connection.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.config.session_ttl_days)
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.config.password_iterations)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_state_is_migrated() {
        let state = CoreState::in_memory(Config::default()).unwrap();
        let conn = state.db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 20);
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("nested").join("db.sqlite3"),
            ..Config::default()
        };
        let state = CoreState::open(config.clone()).unwrap();
        drop(state);
        assert!(config.db_path.exists());
    }

    #[test]
    fn session_ttl_follows_config() {
        let state = CoreState::in_memory(Config {
            session_ttl_days: 3,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(state.session_ttl(), chrono::Duration::days(3));
    }
}
