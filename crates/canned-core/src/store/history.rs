use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::db::Database;

/// One dispatched reply, as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub package: String,
    pub conversation_title: String,
    /// The origin notification's own timestamp.
    pub notified_at: u64,
    pub reply_text: String,
    pub replied_at: u64,
}

/// Read/write access to the durable reply log.
///
/// The decision engine only reads `last_reply_at`; the dispatcher is the
/// only writer. Rows are never deleted, so the latest `replied_at` per
/// (package, title) key can only move forward.
#[derive(Clone)]
pub struct ReplyHistory {
    conn: Arc<Mutex<Connection>>,
}

impl ReplyHistory {
    pub fn new(db: &Database) -> Self {
        Self { conn: db.conn() }
    }

    /// Timestamp of the last reply sent to (package, title), if any.
    pub fn last_reply_at(&self, package: &str, title: &str) -> Result<Option<u64>> {
        let conn = self.conn.lock();
        let last: Option<i64> = conn.query_row(
            "SELECT MAX(l.replied_at) FROM reply_log l
             JOIN app_packages p ON p.id = l.package_id
             WHERE p.package_name = ?1 AND l.conversation_title = ?2",
            params![package, title],
            |row| row.get(0),
        )?;
        Ok(last.map(|ts| ts as u64))
    }

    /// Append one reply to the log, creating the package row on first use.
    pub fn record_reply(&self, record: &ReplyRecord) -> Result<()> {
        let conn = self.conn.lock();
        let package_id = Self::package_id(&conn, &record.package)?;
        conn.execute(
            "INSERT INTO reply_log
                 (package_id, conversation_title, notified_at, reply_text, replied_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                package_id,
                record.conversation_title,
                record.notified_at as i64,
                record.reply_text,
                record.replied_at as i64,
            ],
        )?;
        Ok(())
    }

    fn package_id(conn: &Connection, package: &str) -> Result<i64> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM app_packages WHERE package_name = ?1",
                params![package],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO app_packages (package_name) VALUES (?1)",
            params![package],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first tail of the reply log.
    pub fn recent_replies(&self, limit: usize) -> Result<Vec<ReplyRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT p.package_name, l.conversation_title, l.notified_at, l.reply_text,
                    l.replied_at
             FROM reply_log l
             JOIN app_packages p ON p.id = l.package_id
             ORDER BY l.replied_at DESC, l.id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(ReplyRecord {
                package: row.get(0)?,
                conversation_title: row.get(1)?,
                notified_at: row.get::<_, i64>(2)? as u64,
                reply_text: row.get(3)?,
                replied_at: row.get::<_, i64>(4)? as u64,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Total number of replies ever sent.
    pub fn reply_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM reply_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
