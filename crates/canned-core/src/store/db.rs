use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::Connection;

/// Handle to the SQLite database backing the reply log.
///
/// The schema mirrors the log layout this tool has always used: a small
/// package table assigning each app a stable numeric id, and an append-only
/// log of every reply sent, one row per reply.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the database at `path`, creating file and schema if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database, used in tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS app_packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS reply_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER NOT NULL REFERENCES app_packages(id),
                conversation_title TEXT NOT NULL,
                notified_at INTEGER NOT NULL,
                reply_text TEXT NOT NULL,
                replied_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reply_log_conversation
                ON reply_log(package_id, conversation_title, replied_at);
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("reply-log.sqlite3")).unwrap();

        let conn = db.conn();
        let conn = conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM reply_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reply-log.sqlite3");
        Database::open(&path).unwrap();
        Database::open(&path).unwrap();
    }
}
