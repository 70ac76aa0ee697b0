use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, trace};

/// Content-hash cache keyed by canonical path and modification time.
///
/// Lives in its own SQLite file so it survives `truncate-db`. The connection
/// sits behind a mutex; hashing itself happens outside the lock.
pub struct HashCache {
    conn: Mutex<Connection>,
}

fn to_io(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(ErrorKind::Other, format!("Hash cache error: {}", e))
}

impl HashCache {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        debug!("Using '{}' for hash cache", path);
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS content_hash (
                 cache_key   TEXT PRIMARY KEY,
                 hash        INTEGER NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Cache key includes subsecond timestamp precision to avoid stale entries.
    fn cache_key(file: &Path) -> io::Result<String> {
        let canonical_path = fs::canonicalize(file)?.to_string_lossy().into_owned();
        let modified = fs::metadata(file)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_err(to_io)?;
        Ok(format!(
            "{}|{}.{}",
            canonical_path,
            modified.as_secs(),
            modified.subsec_nanos()
        ))
    }

    fn lookup(&self, key: &str) -> io::Result<Option<u64>> {
        let conn = self.conn.lock().map_err(to_io)?;
        conn.query_row(
            "SELECT hash FROM content_hash WHERE cache_key = ?1",
            params![key],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|hash| hash.map(|h| h as u64))
        .map_err(to_io)
    }

    fn store(&self, key: &str, hash: u64) -> io::Result<()> {
        let conn = self.conn.lock().map_err(to_io)?;
        conn.execute(
            "INSERT OR REPLACE INTO content_hash (cache_key, hash) VALUES (?1, ?2)",
            params![key, hash as i64],
        )
        .map_err(to_io)?;
        Ok(())
    }

    /// Look up a file's content hash, hashing and storing it on a miss.
    pub fn get_content_hash(&self, file: &Path) -> io::Result<u64> {
        let key = Self::cache_key(file)?;
        if let Some(hash) = self.lookup(&key)? {
            trace!("Found hash for {} in cache", file.display());
            return Ok(hash);
        }
        let hash = super::xxhash::hash_file(file)?;
        trace!("No hash found for {} in cache, adding", file.display());
        self.store(&key, hash)?;
        Ok(hash)
    }

    /// Store a hash computed elsewhere for the file's current version.
    pub fn record(&self, file: &Path, hash: u64) -> io::Result<()> {
        let key = Self::cache_key(file)?;
        self.store(&key, hash)
    }

    pub fn count_keys(&self) -> io::Result<usize> {
        let conn = self.conn.lock().map_err(to_io)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM content_hash", [], |row| row.get(0))
            .map_err(to_io)?;
        Ok(count as usize)
    }

    pub fn clear_all(&self) -> io::Result<()> {
        let conn = self.conn.lock().map_err(to_io)?;
        conn.execute("DELETE FROM content_hash", []).map_err(to_io)?;
        info!("Hash cache cleared");
        Ok(())
    }
}
