use crate::error::Error;
use crate::storage::Database;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};

/// One tracked file with at least one duplicate elsewhere in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub file_size: i64,
    /// Other members of the file's duplicate set, sorted.
    pub duplicates: Vec<String>,
}

fn has_hidden_component(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
}

/// Every duplicated file at or beneath `root`, sorted by path. Dot-prefixed
/// entries below `root` are left out unless `include_hidden`.
pub fn duplicates_under(
    db: &Database,
    root: &str,
    include_hidden: bool,
) -> Result<Vec<TreeEntry>, Error> {
    let root = fs::canonicalize(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| root.to_string());
    let root_path = Path::new(&root);

    let mut members: HashMap<i64, Vec<String>> = HashMap::new();
    let mut entries = Vec::new();

    for file in db.duplicate_files_under(&root)? {
        if !include_hidden && has_hidden_component(Path::new(&file.path), root_path) {
            continue;
        }
        let Some(set_id) = file.set_id else {
            continue;
        };
        if !members.contains_key(&set_id) {
            members.insert(set_id, db.duplicate_set_members(set_id)?);
        }
        let duplicates = members[&set_id]
            .iter()
            .filter(|p| **p != file.path)
            .cloned()
            .collect();
        entries.push(TreeEntry {
            path: file.path,
            file_size: file.file_size,
            duplicates,
        });
    }

    Ok(entries)
}
