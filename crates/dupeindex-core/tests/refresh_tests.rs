use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use dupeindex_core::storage::Database;
use dupeindex_core::{AppConfig, RefreshResult, ScanEngine, SilentReporter};

/// A scanned temp tree plus its index.
struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    engine: ScanEngine,
}

impl Fixture {
    fn new(files: &[(&str, Vec<u8>)]) -> Self {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        let root = fs::canonicalize(&root).unwrap();

        for (rel, content) in files {
            let path = root.join(rel.trim_start_matches('/'));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }

        let config = AppConfig {
            root_paths: vec![root.to_string_lossy().into_owned()],
            ignore_patterns: vec![],
            db_path: tmp.path().join("index.db").to_string_lossy().into_owned(),
            hash_cache_path: tmp.path().join("cache.db").to_string_lossy().into_owned(),
            probe_workers: 4,
        };
        let engine = ScanEngine::new(config);
        let fixture = Fixture {
            _tmp: tmp,
            root,
            engine,
        };
        fixture.scan();
        fixture
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    fn abs(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    fn scan(&self) {
        self.engine.scan(&SilentReporter).unwrap();
    }

    fn refresh(&self) -> RefreshResult {
        self.engine.refresh(&SilentReporter).unwrap()
    }

    fn db(&self) -> Database {
        Database::open(self.engine.db_path()).unwrap()
    }

    /// Duplicate sets as sorted lists of root-relative paths, e.g. `/c/d/e`.
    fn sets(&self) -> Vec<Vec<String>> {
        let root = self.root.to_string_lossy().into_owned();
        let mut sets: Vec<Vec<String>> = self
            .db()
            .all_duplicate_sets()
            .unwrap()
            .into_iter()
            .map(|set| {
                let mut paths: Vec<String> = set
                    .paths
                    .iter()
                    .map(|p| p.strip_prefix(&root).unwrap().replace('\\', "/"))
                    .collect();
                paths.sort();
                paths
            })
            .collect();
        sets.sort();
        sets
    }
}

fn set(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

fn content_10000() -> Vec<u8> {
    vec![1u8; 10000]
}

fn basic_tree() -> Fixture {
    Fixture::new(&[
        ("/a", content_10000()),
        ("/b", content_10000()),
        ("/c/d/e", content_10000()),
    ])
}

#[test]
fn test_refresh_removes_deleted_file() {
    let fx = basic_tree();
    fs::remove_file(fx.path("/b")).unwrap();

    let result = fx.refresh();
    assert_eq!(result.removed, 1);
    assert_eq!(result.probed, 3);
    assert_eq!(fx.sets(), vec![set(&["/a", "/c/d/e"])]);
}

#[test]
fn test_refresh_no_change_is_noop() {
    let fx = basic_tree();
    let result = fx.refresh();
    assert_eq!(result.removed, 0);
    assert_eq!(result.pruned_sets, 0);
    assert_eq!(fx.sets(), vec![set(&["/a", "/b", "/c/d/e"])]);
}

#[test]
fn test_refresh_is_idempotent() {
    let fx = basic_tree();
    fs::remove_file(fx.path("/a")).unwrap();
    assert_eq!(fx.refresh().removed, 1);
    let second = fx.refresh();
    assert_eq!(second.removed, 0);
    assert_eq!(second.pruned_sets, 0);
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e"])]);
}

#[test]
fn test_refresh_ignores_content_modification() {
    let fx = basic_tree();
    let before = fx.db().get_tracked_file(&fx.abs("/a")).unwrap().unwrap();
    fs::write(fx.path("/a"), b"abc").unwrap();

    assert_eq!(fx.refresh().removed, 0);
    assert_eq!(fx.sets(), vec![set(&["/a", "/b", "/c/d/e"])]);

    let after = fx.db().get_tracked_file(&fx.abs("/a")).unwrap().unwrap();
    assert_eq!(after.file_size, before.file_size);
    assert_eq!(after.content_hash, before.content_hash);
}

#[test]
fn test_refresh_after_move_then_rescan() {
    let fx = basic_tree();
    fs::rename(fx.path("/a"), fx.path("/f")).unwrap();

    fx.refresh();
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e"])]);

    fx.scan();
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e", "/f"])]);
}

#[test]
fn test_refresh_file_replaced_with_directory() {
    let fx = basic_tree();
    fs::remove_file(fx.path("/a")).unwrap();
    fs::create_dir(fx.path("/a")).unwrap();
    fs::write(fx.path("/a/x"), b"x").unwrap();

    assert_eq!(fx.refresh().removed, 1);
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e"])]);
}

#[cfg(unix)]
#[test]
fn test_refresh_file_replaced_with_symlink() {
    let fx = basic_tree();
    fs::remove_file(fx.path("/a")).unwrap();
    std::os::unix::fs::symlink(fx.path("/b"), fx.path("/a")).unwrap();

    assert_eq!(fx.refresh().removed, 1);
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e"])]);
}

#[cfg(unix)]
#[test]
fn test_refresh_parent_directory_replaced_with_symlink() {
    let fx = Fixture::new(&[("/d/x", vec![b'b']), ("/d2/y", vec![b'b'])]);
    assert_eq!(fx.sets(), vec![set(&["/d/x", "/d2/y"])]);

    fs::remove_dir_all(fx.path("/d2")).unwrap();
    std::os::unix::fs::symlink(fx.path("/d"), fx.path("/d2")).unwrap();

    let result = fx.refresh();
    assert_eq!(result.removed, 1);
    assert_eq!(result.pruned_sets, 1);
    assert!(fx.sets().is_empty());
}

#[cfg(unix)]
#[test]
fn test_refresh_keeps_sets_beside_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fx = Fixture::new(&[("/p1", content_10000()), ("/p2", content_10000())]);
    let odd = fx.root.join(OsStr::from_bytes(b"odd\xff"));
    if fs::write(&odd, content_10000()).is_err() {
        eprintln!("skipping: filesystem rejects non-UTF-8 names");
        return;
    }
    fx.scan();
    assert_eq!(fx.sets(), vec![set(&["/p1", "/p2"])]);

    let result = fx.refresh();
    assert_eq!(result.removed, 0);
    assert_eq!(result.pruned_sets, 0);
    assert_eq!(fx.sets(), vec![set(&["/p1", "/p2"])]);
    assert!(odd.exists());
}

#[test]
fn test_refresh_prunes_singletons() {
    let fx = Fixture::new(&[("/a/x/1", content_10000()), ("/b/2", content_10000())]);
    fs::remove_file(fx.path("/a/x/1")).unwrap();

    let result = fx.refresh();
    assert_eq!(result.removed, 1);
    assert_eq!(result.pruned_sets, 1);
    assert!(fx.sets().is_empty());

    // The survivor stays tracked, just no longer in a set.
    let survivor = fx.db().get_tracked_file(&fx.abs("/b/2")).unwrap().unwrap();
    assert_eq!(survivor.set_id, None);
}

#[test]
fn test_refresh_prunes_both_remainders() {
    let fx = Fixture::new(&[
        ("/a", content_10000()),
        ("/b", content_10000()),
        ("/f", vec![2u8; 1337]),
        ("/g", vec![2u8; 1337]),
    ]);
    fs::remove_file(fx.path("/a")).unwrap();
    fs::remove_file(fx.path("/f")).unwrap();

    let result = fx.refresh();
    assert_eq!(result.removed, 2);
    assert_eq!(result.pruned_sets, 2);
    assert!(fx.sets().is_empty());
}

#[test]
fn test_refresh_preserves_non_singletons() {
    let fx = Fixture::new(&[
        ("/a", content_10000()),
        ("/b", content_10000()),
        ("/c/d/e", content_10000()),
        ("/f", vec![2u8; 1337]),
        ("/g", vec![2u8; 1337]),
    ]);
    fs::remove_file(fx.path("/a")).unwrap();
    fs::remove_file(fx.path("/f")).unwrap();

    fx.refresh();
    assert_eq!(fx.sets(), vec![set(&["/b", "/c/d/e"])]);
}

#[test]
fn test_refresh_never_adds_new_copies() {
    let fx = basic_tree();
    fs::write(fx.path("/h"), content_10000()).unwrap();

    assert_eq!(fx.refresh().removed, 0);
    assert_eq!(fx.sets(), vec![set(&["/a", "/b", "/c/d/e"])]);
}

#[test]
fn test_refresh_removed_directory_drops_everything_beneath() {
    let fx = Fixture::new(&[
        ("/keep/1", content_10000()),
        ("/keep/2", content_10000()),
        ("/gone/x/1", vec![3u8; 500]),
        ("/gone/y/2", vec![3u8; 500]),
        ("/gone/y/3", vec![3u8; 500]),
    ]);
    fs::remove_dir_all(fx.path("/gone")).unwrap();

    let result = fx.refresh();
    assert_eq!(result.removed, 3);
    assert_eq!(fx.sets(), vec![set(&["/keep/1", "/keep/2"])]);
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_refresh_inaccessible_directory() {
    let fx = Fixture::new(&[
        ("/locked/1", vec![4u8; 64]),
        ("/locked/2", vec![4u8; 64]),
        ("/open/1", content_10000()),
        ("/open/2", content_10000()),
    ]);
    let locked = fx.path("/locked");
    set_mode(&locked, 0o000);

    // Permission bits do not bind a privileged user.
    if fs::symlink_metadata(locked.join("1")).is_ok() {
        set_mode(&locked, 0o755);
        eprintln!("skipping: running with permission overrides");
        return;
    }

    let outcome = fx.engine.refresh(&SilentReporter);
    set_mode(&locked, 0o755);

    let result = outcome.expect("an unreadable directory must not fail refresh");
    assert_eq!(result.removed, 2);
    assert_eq!(result.pruned_sets, 1);
    assert_eq!(fx.sets(), vec![set(&["/open/1", "/open/2"])]);
}
