use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

use dupeindex_core::hasher::HashCache;
use dupeindex_core::storage::Database;
use dupeindex_core::tree;
use dupeindex_core::{AppConfig, ScanEngine, SilentReporter};

/// Create a temp directory tree with known duplicates.
/// Layout:
///   root/
///     folder_a/
///       unique_a.txt     ("unique content a")
///       shared.txt       ("shared content xyz")
///     folder_b/
///       unique_b.txt     ("unique content b")
///       shared.txt       ("shared content xyz")  ← duplicate of folder_a/shared.txt
///       .shadow.txt      ("shared content xyz")  ← hidden duplicate
///     folder_c/
///       large_dup_1.bin  (4KB of 0xAA)
///       large_dup_2.bin  (4KB of 0xAA)            ← duplicate within same folder
fn create_test_tree(root: &Path) {
    let folder_a = root.join("folder_a");
    let folder_b = root.join("folder_b");
    let folder_c = root.join("folder_c");
    fs::create_dir_all(&folder_a).unwrap();
    fs::create_dir_all(&folder_b).unwrap();
    fs::create_dir_all(&folder_c).unwrap();

    fs::write(folder_a.join("unique_a.txt"), "unique content a").unwrap();
    fs::write(folder_b.join("unique_b.txt"), "unique content b").unwrap();

    fs::write(folder_a.join("shared.txt"), "shared content xyz").unwrap();
    fs::write(folder_b.join("shared.txt"), "shared content xyz").unwrap();
    fs::write(folder_b.join(".shadow.txt"), "shared content xyz").unwrap();

    let large_content = vec![0xAAu8; 4096];
    let mut f1 = fs::File::create(folder_c.join("large_dup_1.bin")).unwrap();
    f1.write_all(&large_content).unwrap();
    let mut f2 = fs::File::create(folder_c.join("large_dup_2.bin")).unwrap();
    f2.write_all(&large_content).unwrap();
}

fn config_for(root: &Path, work: &Path) -> AppConfig {
    AppConfig {
        root_paths: vec![root.to_string_lossy().into_owned()],
        ignore_patterns: vec![],
        db_path: work.join("index.db").to_string_lossy().into_owned(),
        hash_cache_path: work.join("cache.db").to_string_lossy().into_owned(),
        probe_workers: 2,
    }
}

#[test]
fn test_full_scan_pipeline() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let work = tempdir().unwrap();

    let config = config_for(&root, work.path());
    let engine = ScanEngine::new(config.clone());
    let result = engine.scan(&SilentReporter).unwrap();

    // Hidden files are skipped by default: 2 unique + 2 shared + 2 large.
    assert_eq!(result.total_files_scanned, 6);
    assert_eq!(result.duplicate_groups, 2);
    assert_eq!(result.duplicate_files, 4);
    assert_eq!(result.wasted_bytes, 18 + 4096);

    let db = Database::open(&config.db_path).unwrap();
    let sets = db.all_duplicate_sets().unwrap();
    assert_eq!(sets.len(), 2);
    for set in &sets {
        assert_eq!(set.paths.len(), 2);
        assert_eq!(set.extension, 0);
    }

    // Full hashes went through the cache.
    let cache = HashCache::open(&config.hash_cache_path).unwrap();
    assert_eq!(cache.count_keys().unwrap(), 4);
}

#[test]
fn test_scan_with_hidden_files() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_hidden");
    create_test_tree(&root);
    let work = tempdir().unwrap();

    let engine = ScanEngine::new(config_for(&root, work.path())).with_hidden(true);
    let result = engine.scan(&SilentReporter).unwrap();
    assert_eq!(result.total_files_scanned, 7);
    assert_eq!(result.duplicate_files, 5);
}

#[test]
fn test_scan_with_ignore_patterns() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_ignore");
    create_test_tree(&root);
    let work = tempdir().unwrap();

    let mut config = config_for(&root, work.path());
    config.ignore_patterns = vec!["**/folder_c".to_string()];

    let result = ScanEngine::new(config).scan(&SilentReporter).unwrap();
    assert_eq!(result.duplicate_groups, 1);
}

#[test]
fn test_scan_refresh_tree_round() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_tree");
    create_test_tree(&root);
    let root = fs::canonicalize(&root).unwrap();
    let work = tempdir().unwrap();

    let config = config_for(&root, work.path());
    let engine = ScanEngine::new(config.clone());
    engine.scan(&SilentReporter).unwrap();

    let db = Database::open(&config.db_path).unwrap();
    let listing = tree::duplicates_under(&db, root.to_str().unwrap(), false).unwrap();
    assert_eq!(listing.len(), 4);
    let a_shared = root.join("folder_a").join("shared.txt");
    let b_shared = root.join("folder_b").join("shared.txt");
    let entry = listing
        .iter()
        .find(|e| Path::new(&e.path) == a_shared)
        .unwrap();
    assert_eq!(entry.duplicates, vec![b_shared.to_string_lossy().into_owned()]);
    drop(db);

    fs::remove_file(&b_shared).unwrap();
    let refreshed = engine.refresh(&SilentReporter).unwrap();
    assert_eq!(refreshed.removed, 1);
    assert_eq!(refreshed.pruned_sets, 1);

    let db = Database::open(&config.db_path).unwrap();
    let listing = tree::duplicates_under(&db, root.to_str().unwrap(), false).unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.iter().all(|e| e.path.ends_with(".bin")));
}

#[test]
fn test_missing_root_is_skipped() {
    let tmp = tempdir().unwrap();
    let work = tempdir().unwrap();
    let config = config_for(&tmp.path().join("does_not_exist"), work.path());
    let result = ScanEngine::new(config).scan(&SilentReporter).unwrap();
    assert_eq!(result.total_files_scanned, 0);
    assert_eq!(result.duplicate_groups, 0);
}
