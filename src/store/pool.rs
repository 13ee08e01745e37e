//! r2d2 connection manager for rusqlite.

use rusqlite::Connection;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite connections for an r2d2 pool.
///
/// File databases run in WAL mode so readers don't wait on the writer. Every
/// connection enforces foreign keys and waits up to `BUSY_TIMEOUT` for a write lock
/// instead of failing straight away.
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    target: String,
    in_memory: bool,
}

impl SqliteConnectionManager {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            target: path.into(),
            in_memory: false,
        }
    }

    /// A private in-memory database shared by every connection of this manager.
    pub fn memory() -> Self {
        Self {
            target: format!("file:survey-{}?mode=memory&cache=shared", uuid::Uuid::new_v4()),
            in_memory: true,
        }
    }
}

impl r2d2::ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.target)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        if !self.in_memory {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        }

        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}
