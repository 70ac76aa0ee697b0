use super::cursor::DuplicateSetCursor;
use super::models::*;
use super::sqlite::Database;
use crate::error::Error;
use rusqlite::{params, OptionalExtension, Result};
use std::path::MAIN_SEPARATOR;
use tracing::debug;

const STREAM_SETS_SQL: &str = "SELECT ds.id, ds.file_size, ds.extension, tf.path \
     FROM duplicate_set ds \
     JOIN tracked_file tf ON tf.set_id = ds.id \
     ORDER BY ds.id, tf.path";

/// Prefix for matching paths beneath `root` with `substr`, so `%` and `_`
/// in paths need no escaping.
fn root_prefix(root: &str) -> String {
    if root.ends_with(MAIN_SEPARATOR) {
        root.to_string()
    } else {
        format!("{}{}", root, MAIN_SEPARATOR)
    }
}

fn tracked_file_from_row(row: &rusqlite::Row<'_>) -> Result<TrackedFile> {
    Ok(TrackedFile {
        id: row.get(0)?,
        path: row.get(1)?,
        file_size: row.get(2)?,
        last_modified: row.get(3)?,
        partial_hash: row.get(4)?,
        content_hash: row.get(5)?,
        set_id: row.get(6)?,
    })
}

const TRACKED_FILE_COLUMNS: &str =
    "id, path, file_size, last_modified, partial_hash, content_hash, set_id";

impl Database {
    // ── Summary ──────────────────────────────────────────────────

    pub fn summary(&self) -> Result<Summary> {
        self.connection().query_row(
            "SELECT \
                 (SELECT COUNT(*) FROM tracked_file), \
                 (SELECT COUNT(*) FROM duplicate_set), \
                 (SELECT COUNT(*) FROM tracked_file WHERE set_id IS NOT NULL), \
                 (SELECT COALESCE(SUM(ds.file_size * (m.members - 1)), 0) \
                    FROM duplicate_set ds \
                    JOIN (SELECT set_id, COUNT(*) AS members FROM tracked_file \
                          WHERE set_id IS NOT NULL GROUP BY set_id) m \
                      ON m.set_id = ds.id)",
            [],
            |row| {
                Ok(Summary {
                    files: row.get::<_, i64>(0)? as u64,
                    duplicate_sets: row.get::<_, i64>(1)? as u64,
                    duplicate_files: row.get::<_, i64>(2)? as u64,
                    wasted_bytes: row.get::<_, i64>(3)? as u64,
                })
            },
        )
    }

    // ── Duplicate Sets ───────────────────────────────────────────

    /// Open one streaming read over every duplicate set and hand it to
    /// `consume`. The cursor borrows the database, so no mutation can happen
    /// until `consume` returns. A row error aborts the stream and is returned
    /// in place of `consume`'s result.
    pub fn stream_duplicate_sets<R>(
        &self,
        consume: impl FnOnce(&mut DuplicateSetCursor<'_>) -> R,
    ) -> std::result::Result<R, Error> {
        let mut stmt = self.connection().prepare(STREAM_SETS_SQL)?;
        let rows = stmt.query([])?;
        let mut cursor = DuplicateSetCursor::new(rows);
        let out = consume(&mut cursor);
        match cursor.take_error() {
            Some(e) => Err(e.into()),
            None => Ok(out),
        }
    }

    /// Eager snapshot of every duplicate set, ordered by set id.
    pub fn all_duplicate_sets(&self) -> std::result::Result<Vec<DuplicateSet>, Error> {
        self.stream_duplicate_sets(|cursor| cursor.collect())
    }

    pub fn duplicate_set_members(&self, set_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT path FROM tracked_file WHERE set_id = ?1 ORDER BY path",
        )?;
        let paths = stmt
            .query_map(params![set_id], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(paths)
    }

    // ── Tracked Files ────────────────────────────────────────────

    pub fn get_tracked_file(&self, path: &str) -> Result<Option<TrackedFile>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {} FROM tracked_file WHERE path = ?1",
                    TRACKED_FILE_COLUMNS
                ),
                params![path],
                tracked_file_from_row,
            )
            .optional()
    }

    /// Tracked files at or beneath `root` that belong to a duplicate set,
    /// ordered by path.
    pub fn duplicate_files_under(&self, root: &str) -> Result<Vec<TrackedFile>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM tracked_file \
             WHERE set_id IS NOT NULL \
               AND (path = ?1 OR substr(path, 1, length(?2)) = ?2) \
             ORDER BY path",
            TRACKED_FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map(params![root, root_prefix(root)], tracked_file_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Delete one tracked path, and with it its set membership.
    pub fn remove(&mut self, path: &str) -> std::result::Result<(), Error> {
        let deleted = self
            .connection()
            .execute("DELETE FROM tracked_file WHERE path = ?1", params![path])?;
        if deleted == 0 {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Delete every duplicate set with fewer than two members. A lone
    /// survivor stays tracked with no set. Returns the number of sets deleted.
    pub fn prune_singletons(&mut self) -> Result<usize> {
        let pruned = self.connection().execute(
            "DELETE FROM duplicate_set WHERE id IN ( \
                 SELECT ds.id FROM duplicate_set ds \
                 LEFT JOIN tracked_file tf ON tf.set_id = ds.id \
                 GROUP BY ds.id HAVING COUNT(tf.id) < 2)",
            [],
        )?;
        debug!("Pruned {} singleton duplicate sets", pruned);
        Ok(pruned)
    }

    // ── Index Writes ─────────────────────────────────────────────

    /// Replace everything tracked at or beneath `roots` with `files`, then
    /// regroup duplicate sets from the content hashes of all tracked files.
    /// Runs in one transaction. Returns (files_written, duplicate_sets).
    pub fn replace_index_under(
        &mut self,
        roots: &[String],
        files: &[TrackedFile],
    ) -> Result<(usize, usize)> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection_mut().transaction()?;
        let mut written = 0;
        {
            let mut forget_stmt = tx.prepare_cached(
                "DELETE FROM tracked_file WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
            )?;
            let mut forgotten = 0;
            for root in roots {
                forgotten += forget_stmt.execute(params![root, root_prefix(root)])?;
            }
            debug!("Forgot {} tracked files under {:?}", forgotten, roots);

            let mut insert_stmt = tx.prepare_cached(
                "INSERT INTO tracked_file \
                 (path, file_size, last_modified, partial_hash, content_hash, indexed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(path) DO UPDATE SET \
                     file_size = excluded.file_size, \
                     last_modified = excluded.last_modified, \
                     partial_hash = excluded.partial_hash, \
                     content_hash = excluded.content_hash, \
                     indexed_at = excluded.indexed_at",
            )?;
            for file in files {
                written += insert_stmt.execute(params![
                    file.path,
                    file.file_size,
                    file.last_modified,
                    file.partial_hash,
                    file.content_hash,
                    now,
                ])?;
            }
        }

        tx.execute_batch(
            "UPDATE tracked_file SET set_id = NULL WHERE set_id IS NOT NULL;
             DELETE FROM duplicate_set;",
        )?;
        let sets = tx.execute(
            "INSERT INTO duplicate_set (content_hash, file_size, extension, created_at) \
             SELECT content_hash, file_size, 0, ?1 FROM tracked_file \
             WHERE content_hash IS NOT NULL \
             GROUP BY content_hash, file_size HAVING COUNT(*) >= 2",
            params![now],
        )?;
        tx.execute(
            "UPDATE tracked_file SET set_id = ( \
                 SELECT ds.id FROM duplicate_set ds \
                 WHERE ds.content_hash = tracked_file.content_hash \
                   AND ds.file_size = tracked_file.file_size) \
             WHERE content_hash IS NOT NULL",
            [],
        )?;
        tx.commit()?;

        debug!("Upserted {} tracked files, {} duplicate sets", written, sets);
        Ok((written, sets))
    }
}
