/// A persisted group of byte-identical files.
///
/// `paths` is sorted. `extension` is a reserved attribute carried through the
/// store untouched; the scanner always writes 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    pub id: i64,
    pub paths: Vec<String>,
    pub file_size: i64,
    pub extension: i64,
}

impl DuplicateSet {
    pub fn wasted_bytes(&self) -> i64 {
        self.file_size * (self.paths.len() as i64 - 1).max(0)
    }
}

/// A file known to the index.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub id: i64,
    pub path: String,
    pub file_size: i64,
    pub last_modified: i64,
    pub partial_hash: Option<i64>,
    pub content_hash: Option<i64>,
    pub set_id: Option<i64>,
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub files: u64,
    pub duplicate_sets: u64,
    pub duplicate_files: u64,
    pub wasted_bytes: u64,
}
