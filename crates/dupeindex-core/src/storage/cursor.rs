use super::models::DuplicateSet;
use rusqlite::{Row, Rows};

type MemberRow = (i64, i64, i64, String);

/// Single-pass stream over every persisted duplicate set.
///
/// Wraps one open statement ordered by set id and folds consecutive member
/// rows into a [`DuplicateSet`]. The first row error ends iteration and is
/// kept for [`take_error`](Self::take_error).
pub struct DuplicateSetCursor<'stmt> {
    rows: Rows<'stmt>,
    pending: Option<MemberRow>,
    error: Option<rusqlite::Error>,
    exhausted: bool,
}

impl<'stmt> DuplicateSetCursor<'stmt> {
    pub(crate) fn new(rows: Rows<'stmt>) -> Self {
        Self {
            rows,
            pending: None,
            error: None,
            exhausted: false,
        }
    }

    pub(crate) fn take_error(&mut self) -> Option<rusqlite::Error> {
        self.error.take()
    }

    fn fetch(&mut self) -> Option<MemberRow> {
        if self.exhausted {
            return None;
        }
        let decoded = match self.rows.next() {
            Ok(Some(row)) => decode(row),
            Ok(None) => {
                self.exhausted = true;
                return None;
            }
            Err(e) => Err(e),
        };
        match decoded {
            Ok(member) => Some(member),
            Err(e) => {
                self.error = Some(e);
                self.exhausted = true;
                None
            }
        }
    }
}

fn decode(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl Iterator for DuplicateSetCursor<'_> {
    type Item = DuplicateSet;

    fn next(&mut self) -> Option<DuplicateSet> {
        let (id, file_size, extension, path) = match self.pending.take() {
            Some(member) => member,
            None => self.fetch()?,
        };
        let mut set = DuplicateSet {
            id,
            paths: vec![path],
            file_size,
            extension,
        };

        while let Some(member) = self.fetch() {
            if member.0 != set.id {
                self.pending = Some(member);
                break;
            }
            set.paths.push(member.3);
        }

        if self.error.is_some() {
            return None;
        }
        Some(set)
    }
}
