use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::hasher::{self, HashCache};
use crate::progress::ProgressReporter;
use crate::refresh::{RefreshConfig, RefreshOptions, RefreshResult, Refresher};
use crate::scanner::{self, WalkOptions};
use crate::storage::{Database, TrackedFile};
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, error, info};

pub struct ScanEngine {
    config: AppConfig,
    include_hidden: bool,
}

#[derive(Debug)]
pub struct ScanResult {
    pub scan_duration: Duration,
    pub hash_duration: Duration,
    pub db_write_duration: Duration,
    pub total_files_scanned: usize,
    pub duplicate_groups: usize,
    pub duplicate_files: usize,
    pub wasted_bytes: u64,
}

#[derive(Debug)]
pub struct ScanStats {
    pub distinct_sizes: u64,
    pub total_files: usize,
    pub total_size: u64,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            include_hidden: false,
        }
    }

    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn db_path(&self) -> &str {
        &self.config.db_path
    }

    /// Run the full duplicate detection pipeline:
    /// 1. Parallel directory scan (build file_size → paths map)
    /// 2. Two-tier content hashing (partial 1KB, then full on matches)
    /// 3. Replace the index entries under the scanned roots in SQLite
    pub fn scan(&self, reporter: &dyn ProgressReporter) -> Result<ScanResult, Error> {
        let roots = canonical_roots(&self.config.root_paths);
        info!("Processing directories: {:?}", roots);

        let root_slices: Vec<&str> = roots.iter().map(|s| s.as_str()).collect();
        let walk_options = WalkOptions {
            ignore_patterns: self.config.ignore_patterns.clone(),
            include_hidden: self.include_hidden,
        };

        // Phase 1: Scan
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let size_to_files_map = scanner::build_size_to_files_map(&root_slices, &walk_options)?;
        let scan_duration = scan_start.elapsed();

        let stats = compute_scan_stats(&size_to_files_map);
        reporter.on_scan_complete(stats.total_files, scan_duration.as_secs_f64());
        debug!(
            "Scan completed in {:.2}s: {} distinct sizes, {} files, {} bytes total",
            scan_duration.as_secs_f64(),
            stats.distinct_sizes,
            stats.total_files,
            stats.total_size,
        );

        // Phase 2: Hash
        let cache = HashCache::open(&self.config.hash_cache_path)?;
        let candidates: usize = size_to_files_map
            .iter()
            .filter(|e| e.value().len() > 1)
            .map(|e| e.value().len())
            .sum();
        reporter.on_hash_start(candidates);
        let hash_start = Instant::now();
        let content_hash_map = hasher::build_content_hash_map(size_to_files_map, &cache);
        let hash_duration = hash_start.elapsed();
        reporter.on_hash_complete(content_hash_map.len(), hash_duration.as_secs_f64());
        debug!(
            "Hash completed in {:.2}s: {} duplicate groups",
            hash_duration.as_secs_f64(),
            content_hash_map.len(),
        );

        // Phase 3: Write to SQLite
        reporter.on_db_write_start();
        let db_start = Instant::now();
        let files = tracked_files(&content_hash_map);
        let mut db = Database::open(&self.config.db_path)?;
        let (files_written, groups) = db.replace_index_under(&roots, &files)?;
        let summary = db.summary()?;
        let db_write_duration = db_start.elapsed();
        reporter.on_db_write_complete(files_written, db_write_duration.as_secs_f64());
        debug!(
            "Database write completed in {:.2}s: {} groups, {} files",
            db_write_duration.as_secs_f64(),
            groups,
            files_written,
        );

        Ok(ScanResult {
            scan_duration,
            hash_duration,
            db_write_duration,
            total_files_scanned: stats.total_files,
            duplicate_groups: groups,
            duplicate_files: files_written,
            wasted_bytes: summary.wasted_bytes,
        })
    }

    /// Drop index entries whose files have gone away, using the configured
    /// probe concurrency.
    pub fn refresh(&self, reporter: &dyn ProgressReporter) -> Result<RefreshResult, Error> {
        let mut db = Database::open(&self.config.db_path)?;
        let refresher = Refresher::new(
            RefreshConfig {
                workers: self.config.probe_workers,
            },
            reporter,
        )?;
        refresher.refresh(&mut db, &RefreshOptions::default())
    }
}

fn canonical_roots(root_paths: &[String]) -> Vec<String> {
    let canonical: Vec<String> = root_paths
        .iter()
        .filter_map(|root| match fs::canonicalize(root) {
            Ok(p) => match p.into_os_string().into_string() {
                Ok(s) => Some(s),
                Err(p) => {
                    error!("Skipping non-UTF-8 root {}", Path::new(&p).display());
                    None
                }
            },
            Err(e) => {
                error!("Skipping root {}: {}", root, e);
                None
            }
        })
        .collect();
    config::non_overlapping_directories(canonical)
}

fn compute_scan_stats(map: &DashMap<u64, Vec<PathBuf>>) -> ScanStats {
    let mut distinct_sizes = 0u64;
    let mut total_files = 0usize;
    let mut total_size = 0u64;

    for entry in map.iter() {
        distinct_sizes += 1;
        total_files += entry.value().len();
        total_size += entry.key() * entry.value().len() as u64;
    }

    ScanStats {
        distinct_sizes,
        total_files,
        total_size,
    }
}

fn tracked_files(content_hash_map: &DashMap<u64, Vec<PathBuf>>) -> Vec<TrackedFile> {
    let mut files = Vec::new();

    for entry in content_hash_map.iter() {
        let content_hash = *entry.key() as i64;
        for path in entry.value() {
            // The index stores paths as text; a lossy name would never probe as present.
            let Some(path_str) = path.to_str() else {
                error!("Skipping non-UTF-8 path {}", path.display());
                continue;
            };
            let metadata = match fs::symlink_metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    error!("Error reading metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            let last_modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            files.push(TrackedFile {
                id: 0,
                path: path_str.to_string(),
                file_size: metadata.len() as i64,
                last_modified,
                partial_hash: None,
                content_hash: Some(content_hash),
                set_id: None,
            });
        }
    }

    files
}
