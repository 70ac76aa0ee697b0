use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub ignore_patterns: Vec<String>,
    /// Descend into and collect dot-prefixed entries.
    pub include_hidden: bool,
}

pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.') && name != "." && name != "..")
        .unwrap_or(false)
}

struct Walker {
    ignore_patterns: Vec<Pattern>,
    include_hidden: bool,
}

impl Walker {
    fn skip(&self, path: &Path) -> bool {
        (!self.include_hidden && is_hidden(path))
            || self
                .ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(path))
    }
}

/// Parallel directory traversal. Builds a map of file_size → Vec<PathBuf>,
/// filtering by glob ignore patterns. Skips symlinks, special files and 0-byte
/// files. Unreadable directories and entries that vanish mid-walk are logged
/// and skipped.
pub fn build_size_to_files_map(
    root_paths: &[&str],
    options: &WalkOptions,
) -> io::Result<DashMap<u64, Vec<PathBuf>>> {
    let map: DashMap<u64, Vec<PathBuf>> = DashMap::new();

    let walker = Walker {
        ignore_patterns: options
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect(),
        include_hidden: options.include_hidden,
    };

    root_paths
        .par_iter()
        .try_for_each(|root_dir| visit_dirs(Path::new(root_dir), &map, &walker))?;

    Ok(map)
}

fn visit_dirs(dir: &Path, map: &DashMap<u64, Vec<PathBuf>>, walker: &Walker) -> io::Result<()> {
    if !dir.is_dir() || walker.ignore_patterns.iter().any(|p| p.matches_path(dir)) {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            error!("Access denied reading directory {}: {}", dir.display(), err);
            return Ok(());
        }
        Err(err) => {
            return Err(io::Error::new(
                err.kind(),
                format!("Error reading directory {}: {}", dir.display(), err),
            ));
        }
    };

    entries.par_bridge().try_for_each(|entry_result| {
        let entry = entry_result.map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error reading entry in directory {}: {}", dir.display(), err),
            )
        })?;

        let path = entry.path();
        if walker.skip(&path) {
            return Ok(());
        }

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} vanished during scan", path.display());
                return Ok(());
            }
            Err(err) => {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error getting metadata for {}: {}", path.display(), err),
                ));
            }
        };

        let file_type = metadata.file_type();
        if file_type.is_dir() {
            visit_dirs(&path, map, walker)?;
        } else if file_type.is_file() && metadata.len() > 0 {
            map.entry(metadata.len()).or_default().push(path);
        }
        Ok(())
    })?;

    Ok(())
}
