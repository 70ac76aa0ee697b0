use crate::error::Error;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const SCHEMA_VERSION: i64 = 1;
const INDEX_TABLES: [&str; 2] = ["tracked_file", "duplicate_set"];

/// Handle to the duplicate-set index.
///
/// Reads borrow it shared and writes borrow it exclusively, so a set cursor
/// opened by [`Database::stream_duplicate_sets`] can never overlap a mutation.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the index at `path`, creating missing parent
    /// directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        debug!("Opening index database at '{}'", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite journal mode: {}", mode);

        let db = Database { conn };
        db.migrate_schema()?;
        Ok(db)
    }

    /// The index is derived data, so an older layout is dropped and rebuilt
    /// empty; the next scan repopulates it.
    fn migrate_schema(&self) -> rusqlite::Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version != 0 && version != SCHEMA_VERSION {
            warn!(
                "Index schema version {} does not match {}, rebuilding empty index",
                version, SCHEMA_VERSION
            );
            for table in INDEX_TABLES {
                self.conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
            }
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Forget every tracked file and duplicate set. The hash cache is a
    /// separate file and is left alone.
    pub fn truncate_all(&mut self) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        for table in INDEX_TABLES {
            let removed = tx.execute(&format!("DELETE FROM {}", table), [])?;
            debug!("Truncated {}: {} rows", table, removed);
        }
        tx.commit()
    }
}
