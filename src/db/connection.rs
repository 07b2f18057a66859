use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    created_at      TEXT NOT NULL,
    checkins_logged INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS check_ins (
    user_id     TEXT NOT NULL,
    day         TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    cycle_phase TEXT NOT NULL,
    sleep       INTEGER NOT NULL,
    mood        INTEGER NOT NULL,
    stress      INTEGER NOT NULL,
    pain        INTEGER NOT NULL,
    energy      INTEGER NOT NULL,
    PRIMARY KEY (user_id, day)
);
CREATE TABLE IF NOT EXISTS q_values (
    user_id TEXT NOT NULL,
    state   TEXT NOT NULL,
    action  TEXT NOT NULL,
    value   REAL NOT NULL,
    PRIMARY KEY (user_id, state, action)
);
CREATE TABLE IF NOT EXISTS q_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL,
    state       TEXT NOT NULL,
    action      TEXT NOT NULL,
    value       REAL NOT NULL,
    reward      REAL NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS pending_recommendations (
    id              TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    state           TEXT NOT NULL,
    action          TEXT NOT NULL,
    message         TEXT NOT NULL,
    energy_at_issue INTEGER NOT NULL,
    mood_at_issue   INTEGER NOT NULL,
    issued_at       TEXT NOT NULL,
    resolved        INTEGER NOT NULL DEFAULT 0,
    resolved_at     TEXT,
    outcome         TEXT
);
CREATE TABLE IF NOT EXISTS feedback (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    pending_id   TEXT NOT NULL,
    action_taken INTEGER NOT NULL,
    rating       INTEGER NOT NULL,
    recorded_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pending_user_open
    ON pending_recommendations (user_id, resolved);
CREATE INDEX IF NOT EXISTS idx_history_user
    ON q_history (user_id);
";

/// Handle to the engine's SQLite database.
///
/// Cheap to clone; all clones share one serialized connection. A missing
/// database file auto-initialises to an empty schema rather than failing.
#[derive(Debug, Clone)]
pub struct Database {
    /// Path to the database file
    path: PathBuf,
    /// Connection to the database
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open a database connection, creating the schema if needed.
    /// `None` opens an in-memory database (used by tests).
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self> {
        let (path_buf, conn) = match path {
            Some(path) => {
                let path_buf = PathBuf::from(path.as_ref());
                debug!("Opening database at {}", path_buf.display());
                (path_buf.clone(), Connection::open(&path_buf)?)
            }
            None => {
                debug!("Opening in-memory database");
                (PathBuf::from(":memory:"), Connection::open_in_memory()?)
            }
        };

        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            path: path_buf,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path this database was opened at
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure against the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection.lock().unwrap();
        f(&conn)
    }

    /// Run a closure inside a transaction. The transaction commits only
    /// if the closure succeeds, so multi-statement operations are
    /// all-or-nothing.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.connection.lock().unwrap();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoachError;
    use tempfile::NamedTempFile;

    #[test]
    fn test_in_memory_schema_initialises() {
        let db = Database::open(None::<&str>).unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let file = NamedTempFile::new().unwrap();
        {
            let db = Database::open(Some(file.path())).unwrap();
            db.transaction(|tx| {
                tx.execute(
                    "INSERT INTO users (user_id, created_at) VALUES ('u1', '2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(Some(file.path())).unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open(None::<&str>).unwrap();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO users (user_id, created_at) VALUES ('u1', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(CoachError::storage("boom"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
