use chrono::{DateTime, Local};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Result};
use std::path::PathBuf;

/// Persistent per-user training record, appended once per finished session.
pub trait UserRecordStore {
    fn add_user_results(&mut self, average_snr: f32, rewards: u32) -> Result<()>;
}

/// One stored session outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub finished_at: DateTime<Local>,
    pub average_snr: f32,
    pub rewards: u32,
}

/// Sqlite-backed record store under the user's state directory.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn new() -> Result<Self> {
        let db_path = Self::db_path().unwrap_or_else(|| PathBuf::from("lisn_results.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        Self::with_connection(Connection::open(&db_path)?)
    }

    /// In-memory store, used by tests and the `--no-save` mode.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS training_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at TEXT NOT NULL,
                average_snr REAL NOT NULL,
                rewards INTEGER NOT NULL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_training_results_finished_at \
             ON training_results(finished_at)",
            [],
        )?;
        Ok(SqliteRecordStore { conn })
    }

    /// Database file under $HOME/.local/state/lisn, falling back to the
    /// platform data directory.
    fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home).join(".local").join("state").join("lisn");
            Some(state_dir.join("results.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "lisn") {
            Some(proj_dirs.data_local_dir().join("results.db"))
        } else {
            None
        }
    }

    /// Most recent sessions, newest first.
    pub fn recent_results(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT finished_at, average_snr, rewards FROM training_results \
             ORDER BY finished_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let finished_at: String = row.get(0)?;
            let average_snr: f64 = row.get(1)?;
            let rewards: i64 = row.get(2)?;
            Ok((finished_at, average_snr, rewards))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (finished_at, average_snr, rewards) = row?;
            let finished_at = DateTime::parse_from_rfc3339(&finished_at)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| Local::now());
            records.push(SessionRecord {
                finished_at,
                average_snr: average_snr as f32,
                rewards: rewards as u32,
            });
        }
        Ok(records)
    }

    pub fn session_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM training_results", [], |row| row.get(0))
    }
}

impl UserRecordStore for SqliteRecordStore {
    fn add_user_results(&mut self, average_snr: f32, rewards: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO training_results (finished_at, average_snr, rewards) \
             VALUES (?1, ?2, ?3)",
            params![Local::now().to_rfc3339(), average_snr as f64, rewards],
        )?;
        Ok(())
    }
}
